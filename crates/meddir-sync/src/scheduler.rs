//! Sync scheduler - turns triggers into sync cycles
//!
//! The [`SyncScheduler`] owns the only loop that calls
//! [`SyncManager::cycle`]. Cycles are started by:
//!
//! - a one-off startup cycle after `startup_delay`
//! - a periodic interval (optional)
//! - connectivity restoration, observed through a watch channel
//! - explicit requests through a [`SyncTrigger`]
//!
//! ## Flow
//!
//! ```text
//! SyncTrigger ──→ mpsc (capacity 1) ──┐
//! ConnectivityMonitor ──→ watch ──────┼──→ SyncScheduler ──→ SyncManager::cycle()
//! interval / startup timer ───────────┘
//! ```
//!
//! The request channel holds a single pending signal: triggers that arrive
//! while a cycle runs collapse into one follow-up cycle.

use std::{sync::Arc, time::Duration};

use meddir_core::config::SyncConfig;
use tokio::{
    sync::{mpsc, watch},
    time::{Instant, Interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::manager::{CycleOutcome, SyncManager};

/// Why a cycle was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSignal {
    Startup,
    Periodic,
    ConnectivityRestored,
    /// The application reported local changes that need pushing
    SyncRequired,
    Manual,
}

// ============================================================================
// SyncTrigger
// ============================================================================

/// Cloneable handle for requesting a cycle
#[derive(Debug, Clone)]
pub struct SyncTrigger {
    tx: mpsc::Sender<SyncSignal>,
}

impl SyncTrigger {
    /// Requests a cycle.
    ///
    /// Returns `false` only when the scheduler has stopped. A request made
    /// while another is already pending is merged into it.
    pub fn request(&self, signal: SyncSignal) -> bool {
        match self.tx.try_send(signal) {
            Ok(()) => {
                debug!(?signal, "Sync requested");
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(?signal, "Sync already pending, request coalesced");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

// ============================================================================
// SyncScheduler
// ============================================================================

pub struct SyncScheduler {
    manager: Arc<SyncManager>,
    requests: mpsc::Receiver<SyncSignal>,
    interval: Option<Duration>,
    startup_delay: Option<Duration>,
    connectivity: Option<watch::Receiver<bool>>,
}

impl SyncScheduler {
    /// Creates a scheduler and the trigger that feeds it
    pub fn new(manager: Arc<SyncManager>, config: &SyncConfig) -> (Self, SyncTrigger) {
        let (tx, rx) = mpsc::channel(1);

        info!(
            interval_secs = config.poll_interval_secs,
            startup_delay_ms = config.startup_delay_ms,
            "Creating sync scheduler"
        );

        let scheduler = Self {
            manager,
            requests: rx,
            interval: config.poll_interval(),
            startup_delay: Some(Duration::from_millis(config.startup_delay_ms)),
            connectivity: None,
        };
        (scheduler, SyncTrigger { tx })
    }

    /// Starts a cycle whenever `online` flips from `false` to `true`
    pub fn watch_connectivity(mut self, online: watch::Receiver<bool>) -> Self {
        self.connectivity = Some(online);
        self
    }

    /// Disables the startup cycle
    pub fn without_startup_cycle(mut self) -> Self {
        self.startup_delay = None;
        self
    }

    /// Main loop. Runs until `cancel` fires or every trigger is dropped.
    ///
    /// Returns the number of cycles started.
    pub async fn run(self, cancel: CancellationToken) -> u64 {
        let Self {
            manager,
            mut requests,
            interval,
            startup_delay,
            mut connectivity,
        } = self;

        info!("Sync scheduler starting");

        let startup = tokio::time::sleep(startup_delay.unwrap_or_default());
        tokio::pin!(startup);
        let mut startup_pending = startup_delay.is_some();

        let mut ticker =
            interval.map(|period| tokio::time::interval_at(Instant::now() + period, period));
        let mut last_online = connectivity
            .as_mut()
            .map_or(true, |rx| *rx.borrow_and_update());
        let mut cycles = 0;

        loop {
            let signal = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Cancellation requested");
                    break;
                }
                _ = &mut startup, if startup_pending => {
                    startup_pending = false;
                    SyncSignal::Startup
                }
                _ = next_tick(&mut ticker) => SyncSignal::Periodic,
                _ = next_restoration(&mut connectivity, &mut last_online) => SyncSignal::ConnectivityRestored,
                request = requests.recv() => match request {
                    Some(signal) => signal,
                    None => {
                        info!("All sync triggers dropped");
                        break;
                    }
                },
            };

            cycles += 1;
            run_cycle(&manager, signal).await;
        }

        info!(cycles, "Sync scheduler stopped");
        cycles
    }
}

async fn run_cycle(manager: &SyncManager, signal: SyncSignal) {
    debug!(?signal, "Running scheduled cycle");
    match manager.cycle().await {
        CycleOutcome::Completed(report) => {
            debug!(?signal, pushed = report.pushed, pulled = report.pulled(), "Scheduled cycle done");
        }
        CycleOutcome::Skipped(reason) => {
            debug!(?signal, ?reason, "Scheduled cycle skipped");
        }
        CycleOutcome::Failed { error, .. } => {
            warn!(?signal, %error, "Scheduled cycle failed");
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Resolves on the next offline-to-online transition
///
/// `last_online` persists across calls so a transition observed while a
/// cycle was running is not lost.
async fn next_restoration(
    connectivity: &mut Option<watch::Receiver<bool>>,
    last_online: &mut bool,
) {
    let Some(rx) = connectivity else {
        return std::future::pending().await;
    };

    loop {
        if rx.changed().await.is_err() {
            // Monitor dropped; stop watching
            *connectivity = None;
            return std::future::pending().await;
        }
        let online = *rx.borrow_and_update();
        let restored = online && !*last_online;
        *last_online = online;
        if restored {
            return;
        }
    }
}
