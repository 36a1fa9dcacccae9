//! Status command - Display synchronization status
//!
//! Provides the `meddir status` CLI command which shows:
//! 1. Sync state, connectivity and last successful sync
//! 2. Local record counts and pending/failed operations
//! 3. Content cache usage against its ceiling

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use super::CommandContext;
use crate::output::{format_bytes, plural};

#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let services = ctx.open_services().await?;

        let status = services
            .manager
            .status()
            .await
            .context("Failed to read sync status")?;
        let cache = services
            .content
            .size_info()
            .await
            .context("Failed to read content cache")?;
        let ceiling = services.content.policy().max_bytes;

        info!(pending = status.pending_count, "Showing status");

        if ctx.format.is_json() {
            let json = serde_json::json!({
                "status": status,
                "content_cache": {
                    "entries": cache.count,
                    "total_bytes": cache.total_bytes,
                    "max_bytes": ceiling,
                },
            });
            formatter.print_json(&json);
            services.close().await;
            return Ok(());
        }

        formatter.success(&format!("meddir status - {}", ctx.config.remote.base_url));
        formatter.info("");
        formatter.info(&format!(
            "State:     {}{}",
            status.state,
            if status.is_online { "" } else { " (offline)" }
        ));

        match status.last_sync_time {
            Some(time) => {
                formatter.info(&format!(
                    "Last sync: {}",
                    time.format("%Y-%m-%d %H:%M:%S UTC")
                ));
            }
            None => formatter.info("Last sync: Never"),
        }

        let counts = status.storage_counts;
        formatter.info(&format!(
            "Records:   {} folder{}, {} document{}",
            counts.folders,
            plural(counts.folders),
            counts.documents,
            plural(counts.documents)
        ));
        formatter.info(&format!(
            "Pending:   {} operation{}",
            counts.pending,
            plural(counts.pending)
        ));
        if counts.failed > 0 {
            formatter.warn(&format!(
                "{} operation{} failed permanently. Run 'meddir pending --failed' for details.",
                counts.failed,
                plural(counts.failed)
            ));
        }

        let percent = if ceiling > 0 {
            cache.total_bytes as f64 / ceiling as f64 * 100.0
        } else {
            0.0
        };
        formatter.info(&format!(
            "Cache:     {} payload{}, {} of {} ({:.1}%)",
            cache.count,
            plural(cache.count as u64),
            format_bytes(cache.total_bytes),
            format_bytes(ceiling),
            percent
        ));

        services.close().await;
        Ok(())
    }
}
