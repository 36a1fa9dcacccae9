//! Sync command - Run one push/pull cycle
//!
//! Provides the `meddir sync` CLI command which:
//! 1. Opens the Local Store, content cache and remote client
//! 2. Pushes pending operations, then pulls the authoritative state
//! 3. Waits for document priming unless `--no-prime` is given
//! 4. Displays the cycle report

use anyhow::Result;
use clap::Args;
use meddir_sync::{CycleOutcome, CycleReport};

use super::CommandContext;
use crate::output::{format_duration, plural, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Do not wait for document payloads to be cached
    #[arg(long)]
    pub no_prime: bool,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let services = ctx.open_services().await?;

        formatter.info("Starting synchronization...");
        let outcome = services.manager.cycle().await;

        let primed = if self.no_prime || !outcome.is_completed() {
            None
        } else {
            services.manager.wait_for_priming().await
        };

        if ctx.format.is_json() {
            let mut json = outcome_json(&outcome);
            if let Some(report) = &primed {
                json["primed"] = serde_json::json!({
                    "cached": report.cached,
                    "failed": report.failed,
                    "evicted": report.eviction.evicted.len(),
                });
            }
            formatter.print_json(&json);
        } else {
            show_outcome(&*formatter, &outcome, "Sync");
            if let Some(report) = &primed {
                if report.cached + report.failed > 0 {
                    formatter.info(&format!(
                        "Documents cached: {} ({} failed)",
                        report.cached, report.failed
                    ));
                }
            }
        }

        services.close().await;
        Ok(())
    }
}

/// JSON view of a cycle outcome, shared with `resync`
pub fn outcome_json(outcome: &CycleOutcome) -> serde_json::Value {
    match outcome {
        CycleOutcome::Completed(report) => serde_json::json!({
            "status": "completed",
            "report": report_json(report),
        }),
        CycleOutcome::Skipped(reason) => serde_json::json!({
            "status": "skipped",
            "reason": format!("{:?}", reason),
        }),
        CycleOutcome::Failed { error, report } => serde_json::json!({
            "status": "failed",
            "error": error.to_string(),
            "report": report_json(report),
        }),
    }
}

fn report_json(report: &CycleReport) -> serde_json::Value {
    serde_json::json!({
        "pushed": report.pushed,
        "push_failed": report.push_failed,
        "skipped": report.skipped,
        "pulled_folders": report.pulled_folders,
        "pulled_documents": report.pulled_documents,
        "pruned": report.pruned,
        "errors": report.errors,
        "duration_ms": report.duration_ms,
    })
}

/// Human view of a cycle outcome, shared with `resync`
pub fn show_outcome(formatter: &dyn OutputFormatter, outcome: &CycleOutcome, label: &str) {
    match outcome {
        CycleOutcome::Completed(report) => {
            formatter.success(&format!(
                "{} completed in {}",
                label,
                format_duration(report.duration_ms)
            ));
            show_report(formatter, report);
        }
        CycleOutcome::Skipped(reason) => {
            formatter.warn(&format!("{} skipped: {:?}", label, reason));
        }
        CycleOutcome::Failed { error, report } => {
            formatter.error(&format!("{} failed: {}", label, error));
            show_report(formatter, report);
        }
    }
}

fn show_report(formatter: &dyn OutputFormatter, report: &CycleReport) {
    if report.pushed > 0 {
        formatter.info(&format!(
            "Pushed:   {} operation{}",
            report.pushed,
            plural(report.pushed)
        ));
    }
    if report.skipped > 0 {
        formatter.info(&format!(
            "Skipped:  {} operation{}",
            report.skipped,
            plural(report.skipped)
        ));
    }
    formatter.info(&format!(
        "Pulled:   {} folder{}, {} document{}",
        report.pulled_folders,
        plural(report.pulled_folders),
        report.pulled_documents,
        plural(report.pulled_documents)
    ));
    if report.pruned > 0 {
        formatter.info(&format!("Removed:  {} stale record{}", report.pruned, plural(report.pruned)));
    }

    if !report.errors.is_empty() {
        formatter.error(&format!(
            "{} operation{} failed:",
            report.errors.len(),
            plural(report.errors.len() as u64)
        ));
        for err in &report.errors {
            formatter.info(&format!("  - {}", err));
        }
    }
}
