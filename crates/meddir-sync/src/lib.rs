//! meddir Sync - Reconciliation with the remote authority
//!
//! Provides:
//! - Push of the pending-operation log with temporary-id remapping
//! - Full pull with overwrite and pruning of synced records
//! - Retry policy with an attempt cap and optional backoff
//! - Scheduling: startup, periodic, connectivity-restored and explicit triggers
//!
//! ## Modules
//!
//! - [`manager`] - `SyncManager` orchestrating push/pull cycles
//! - [`scheduler`] - `SyncScheduler` and the `SyncTrigger` handle
//! - [`retry`] - `RetryPolicy`
//! - [`activity`] - busy indicator shared with other components
//! - [`connectivity`] - `IConnectivity` implementation
//! - [`events`] - broadcast `IEventSink`

pub mod activity;
pub mod connectivity;
pub mod events;
pub mod manager;
pub mod retry;
pub mod scheduler;

pub use activity::SyncActivity;
pub use connectivity::ConnectivityMonitor;
pub use events::BroadcastEvents;
pub use manager::{CycleOutcome, CycleReport, SkipReason, SyncManager};
pub use retry::RetryPolicy;
pub use scheduler::{SyncScheduler, SyncSignal, SyncTrigger};
