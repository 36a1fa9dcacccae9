//! Sync manager state and status snapshots

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of the reconciliation cycle
///
/// ```text
/// Idle -> Pushing -> Pulling -> Idle
///            \-------> Failed -> Idle
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SyncState {
    #[default]
    Idle = 0,
    Pushing = 1,
    Pulling = 2,
    Failed = 3,
}

impl SyncState {
    /// Decode the value stored in an atomic
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => SyncState::Pushing,
            2 => SyncState::Pulling,
            3 => SyncState::Failed,
            _ => SyncState::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Pushing => "pushing",
            SyncState::Pulling => "pulling",
            SyncState::Failed => "failed",
        }
    }
}

impl Display for SyncState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record counts held by the local store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageCounts {
    pub folders: u64,
    pub documents: u64,
    pub pending: u64,
    /// Pending operations that exhausted their retry budget
    pub failed: u64,
}

/// Snapshot returned by `SyncManager::status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub state: SyncState,
    pub is_syncing: bool,
    pub is_online: bool,
    pub pending_count: u64,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub storage_counts: StorageCounts,
}
