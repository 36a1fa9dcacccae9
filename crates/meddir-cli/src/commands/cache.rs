//! Cache command - Inspect and manage the content cache
//!
//! - `meddir cache info` - entry counts per bucket and document payload size
//! - `meddir cache clear` - drop every cached document payload
//! - `meddir cache prime [--folder ID]` - cache the payloads of one folder,
//!   or of every document, from the Local Store

use anyhow::{Context, Result};
use clap::Subcommand;
use meddir_core::domain::{EntityId, RemoteId};
use tracing::info;

use super::CommandContext;
use crate::services::Services;
use crate::output::{format_bytes, plural};

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Show cache usage
    Info,
    /// Remove all cached document payloads
    Clear,
    /// Download document payloads into the cache
    Prime {
        /// Only documents of this folder (authoritative id)
        #[arg(long)]
        folder: Option<i64>,
    },
}

impl CacheCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let services = ctx.open_services().await?;
        let result = match self {
            CacheCommand::Info => execute_info(ctx, &services).await,
            CacheCommand::Clear => execute_clear(ctx, &services).await,
            CacheCommand::Prime { folder } => execute_prime(ctx, &services, *folder).await,
        };
        services.close().await;
        result
    }
}

async fn execute_info(ctx: &CommandContext, services: &Services) -> Result<()> {
    let formatter = ctx.formatter();
    let layer = services.intercept_layer(None)?;
    let status = layer
        .cache_status()
        .await
        .context("Failed to read cache status")?;
    let ceiling = services.content.policy().max_bytes;

    if ctx.format.is_json() {
        let mut json = serde_json::to_value(&status)?;
        json["max_bytes"] = serde_json::json!(ceiling);
        formatter.print_json(&json);
        return Ok(());
    }

    formatter.success(&format!("Content cache ({})", ctx.config.content_cache.dir.display()));
    for (bucket, count) in &status.caches {
        formatter.info(&format!(
            "{:<10} {} entr{}",
            bucket,
            count,
            if *count == 1 { "y" } else { "ies" }
        ));
    }
    formatter.info(&format!(
        "Documents: {} of {}",
        format_bytes(status.document_bytes),
        format_bytes(ceiling)
    ));
    Ok(())
}

async fn execute_clear(ctx: &CommandContext, services: &Services) -> Result<()> {
    let formatter = ctx.formatter();
    let removed = services
        .content
        .clear()
        .await
        .context("Failed to clear document cache")?;

    info!(removed, "Document cache cleared");
    if ctx.format.is_json() {
        formatter.print_json(&serde_json::json!({ "removed": removed }));
    } else {
        formatter.success(&format!(
            "Removed {} cached document{}",
            removed,
            plural(removed as u64)
        ));
    }
    Ok(())
}

async fn execute_prime(
    ctx: &CommandContext,
    services: &Services,
    folder: Option<i64>,
) -> Result<()> {
    let formatter = ctx.formatter();
    let report = match folder {
        Some(id) => {
            let folder_id: EntityId = RemoteId::from(id).into();
            services
                .content
                .preload_folder(&*services.store, &folder_id)
                .await
        }
        None => services.content.preload_all(&*services.store).await,
    }
    .context("Failed to read documents from the local store")?;

    if ctx.format.is_json() {
        formatter.print_json(&serde_json::json!({
            "cached": report.cached,
            "failed": report.failed,
            "evicted": report.eviction.evicted,
            "bytes_freed": report.eviction.bytes_freed,
        }));
    } else {
        formatter.success(&format!(
            "Cached {} document{}",
            report.cached,
            plural(report.cached as u64)
        ));
        if report.failed > 0 {
            formatter.warn(&format!(
                "{} document{} could not be downloaded",
                report.failed,
                plural(report.failed as u64)
            ));
        }
        if !report.eviction.is_empty() {
            formatter.info(&format!(
                "Evicted {} to stay under the ceiling",
                format_bytes(report.eviction.bytes_freed)
            ));
        }
    }
    Ok(())
}
