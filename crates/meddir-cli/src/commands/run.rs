//! Run command - Long-running synchronization service
//!
//! `meddir run` keeps the engine alive until SIGINT/SIGTERM:
//! 1. Pre-caches the configured static assets
//! 2. Hosts the interception layer service, which relays sync-required
//!    signals to the scheduler
//! 3. Starts the sync scheduler (startup, periodic and connectivity cycles)
//! 4. Logs engine events as they happen
//!
//! Shutdown is driven by a `CancellationToken` cancelled from the signal
//! handler.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use meddir_core::ports::EngineEvent;
use meddir_intercept::{InterceptLayer, LayerHandle, LayerService};
use meddir_sync::SyncScheduler;
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Skip pre-caching static assets on startup
    #[arg(long)]
    pub no_precache: bool,
}

impl RunCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let services = ctx.open_services().await?;

        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal(signal_token).await;
        });

        let (scheduler, trigger) = SyncScheduler::new(services.manager.clone(), &ctx.config.sync);
        let scheduler = scheduler.watch_connectivity(services.connectivity.subscribe());
        let layer = Arc::new(services.intercept_layer(Some(trigger))?);

        if !self.no_precache {
            let report = layer.install().await;
            if !report.failed.is_empty() {
                warn!(failed = ?report.failed, "Some static assets were not pre-cached");
            }
        }

        let (layer_task, layer_handle) = start_layer(layer, &shutdown);
        match layer_handle.cache_status().await {
            Ok(status) => info!(
                caches = ?status.caches,
                document_bytes = status.document_bytes,
                "Interception layer ready"
            ),
            Err(e) => warn!(error = %e, "Interception layer did not answer"),
        }

        let events = tokio::spawn(log_events(services.events.subscribe(), shutdown.clone()));

        formatter.success("meddir running. Press Ctrl+C to stop.");
        info!(
            poll_interval_secs = ctx.config.sync.poll_interval_secs,
            "Sync service started"
        );

        let cycles = scheduler.run(shutdown.clone()).await;
        shutdown.cancel();
        if let Err(e) = events.await {
            warn!(error = %e, "Event logger did not stop cleanly");
        }
        drop(layer_handle);
        if let Err(e) = layer_task.await {
            warn!(error = %e, "Interception layer service did not stop cleanly");
        }

        services.close().await;
        info!(cycles, "meddir shut down gracefully");
        formatter.success(&format!("Stopped after {} sync cycle(s)", cycles));
        Ok(())
    }
}

/// Spawns the layer's message loop; it stops on `shutdown` or once every
/// handle is dropped
fn start_layer(
    layer: Arc<InterceptLayer>,
    shutdown: &CancellationToken,
) -> (JoinHandle<()>, LayerHandle) {
    let (service, handle) = LayerService::new(layer);
    (tokio::spawn(service.run(shutdown.clone())), handle)
}

async fn log_events(mut rx: broadcast::Receiver<EngineEvent>, shutdown: CancellationToken) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = rx.recv() => event,
        };

        match event {
            Ok(EngineEvent::SyncFailed { error }) => error!(%error, "sync-failed"),
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => info!(event = event.name(), payload = %json, "Engine event"),
                Err(_) => info!(event = event.name(), "Engine event"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event logger lagged behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}
