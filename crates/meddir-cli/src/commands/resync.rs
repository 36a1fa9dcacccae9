//! Resync command - Discard local state and pull everything again

use anyhow::Result;
use clap::Args;

use super::{
    sync::{outcome_json, show_outcome},
    CommandContext,
};

#[derive(Debug, Args)]
pub struct ResyncCommand {
    /// Confirm that unpushed local changes may be lost
    #[arg(long)]
    pub yes: bool,
}

impl ResyncCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let services = ctx.open_services().await?;

        let pending = services.manager.status().await?.pending_count;
        if pending > 0 && !self.yes {
            formatter.error(&format!(
                "{} pending operation(s) would be discarded. Re-run with --yes to continue.",
                pending
            ));
            services.close().await;
            return Ok(());
        }

        formatter.info("Clearing local data and pulling from the remote authority...");
        let outcome = services.manager.full_resync().await;
        if outcome.is_completed() {
            services.manager.wait_for_priming().await;
        }

        if ctx.format.is_json() {
            formatter.print_json(&outcome_json(&outcome));
        } else {
            show_outcome(&*formatter, &outcome, "Resync");
        }

        services.close().await;
        Ok(())
    }
}
