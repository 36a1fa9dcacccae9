//! Lifecycle and progress events (driven/secondary port)
//!
//! The surrounding application presents sync failures and cache progress;
//! the engine only emits events through an [`IEventSink`].
//!
//! ## Design Notes
//!
//! - Emission is fire-and-forget: a sink never blocks or fails the caller.
//! - Event names serialize as `sync-started`, `cache-progress`, etc.

use serde::{Deserialize, Serialize};

/// An event emitted by the sync manager or the content cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EngineEvent {
    SyncStarted,
    SyncCompleted {
        pushed: u64,
        failed: u64,
        pulled: u64,
    },
    SyncFailed {
        error: String,
    },
    CacheStarted {
        count: usize,
    },
    CacheProgress {
        cached: usize,
        failed: usize,
        remaining: usize,
    },
    CacheCompleted {
        cached: usize,
        failed: usize,
    },
}

impl EngineEvent {
    /// Event name as seen by subscribers
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::SyncStarted => "sync-started",
            EngineEvent::SyncCompleted { .. } => "sync-completed",
            EngineEvent::SyncFailed { .. } => "sync-failed",
            EngineEvent::CacheStarted { .. } => "cache-started",
            EngineEvent::CacheProgress { .. } => "cache-progress",
            EngineEvent::CacheCompleted { .. } => "cache-completed",
        }
    }
}

/// Receives engine events
pub trait IEventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Sink that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl IEventSink for NullEventSink {
    fn emit(&self, _event: EngineEvent) {}
}
