//! Pending command - List queued operations
//!
//! `meddir pending` lists the operation log in push order. `--failed`
//! narrows it to operations whose retry budget is exhausted, and `--retry`
//! makes those eligible again.

use anyhow::{Context, Result};
use clap::Args;
use meddir_core::{domain::PendingOperation, ports::ILocalStore};

use super::CommandContext;
use crate::output::plural;

#[derive(Debug, Args)]
pub struct PendingCommand {
    /// Only show operations that exhausted their retries
    #[arg(long)]
    pub failed: bool,

    /// Reset failed operations so the next cycle pushes them again
    #[arg(long)]
    pub retry: bool,
}

impl PendingCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let services = ctx.open_services().await?;

        if self.retry {
            let reset = services
                .manager
                .retry_failed()
                .await
                .context("Failed to reset operations")?;
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({ "reset": reset }));
            } else {
                formatter.success(&format!(
                    "{} failed operation{} queued for retry",
                    reset,
                    plural(reset)
                ));
            }
            services.close().await;
            return Ok(());
        }

        let operations: Vec<PendingOperation> = services
            .store
            .pending_operations()
            .await
            .context("Failed to read pending operations")?
            .into_iter()
            .filter(|op| !self.failed || op.failed)
            .collect();

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::to_value(&operations)?);
        } else if operations.is_empty() {
            formatter.success(if self.failed {
                "No failed operations"
            } else {
                "Nothing pending"
            });
        } else {
            formatter.success(&format!(
                "{} operation{}",
                operations.len(),
                plural(operations.len() as u64)
            ));
            for op in &operations {
                let marker = if op.failed { " [failed]" } else { "" };
                formatter.info(&format!(
                    "#{} {} (attempts: {}){}",
                    op.seq,
                    op.describe(),
                    op.attempts,
                    marker
                ));
                if let Some(error) = &op.error {
                    formatter.info(&format!("    last error: {}", error));
                }
            }
        }

        services.close().await;
        Ok(())
    }
}
