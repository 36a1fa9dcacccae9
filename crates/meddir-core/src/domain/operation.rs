//! Pending operations (the local mutation log)

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{Attributes, EntityKind};
use super::errors::DomainError;
use super::ids::EntityId;

/// Kind of mutation to replay against the remote authority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Create,
    Update,
    Delete,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Create => "create",
            OperationType::Update => "update",
            OperationType::Delete => "delete",
        }
    }
}

impl Display for OperationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(OperationType::Create),
            "update" => Ok(OperationType::Update),
            "delete" => Ok(OperationType::Delete),
            other => Err(DomainError::UnknownVariant {
                what: "operation type",
                value: other.to_string(),
            }),
        }
    }
}

/// An operation about to be appended to the log
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub op_type: OperationType,
    pub entity_kind: EntityKind,
    pub entity_id: EntityId,
    /// Owning folder of a document, needed to address document endpoints
    pub parent_id: Option<EntityId>,
    pub payload: Attributes,
    pub has_file: bool,
}

/// A queued, not yet acknowledged mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Monotonic local sequence number
    pub seq: i64,
    pub op_type: OperationType,
    pub entity_kind: EntityKind,
    pub entity_id: EntityId,
    pub parent_id: Option<EntityId>,
    pub payload: Attributes,
    pub has_file: bool,
    pub created_at: DateTime<Utc>,
    pub attempts: u32,
    /// Set once the retry budget is exhausted; excluded from automatic pushes
    pub failed: bool,
    pub error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl PendingOperation {
    /// Record an unsuccessful push attempt
    ///
    /// Returns `true` when this attempt exhausted the retry budget.
    pub fn record_failure(&mut self, error: impl Into<String>, max_attempts: u32) -> bool {
        self.attempts += 1;
        self.error = Some(error.into());
        self.last_attempt_at = Some(Utc::now());
        if self.attempts >= max_attempts {
            self.failed = true;
        }
        self.failed
    }

    /// Clear the failure state so the operation is pushed again
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.failed = false;
        self.error = None;
        self.last_attempt_at = None;
    }

    /// Short description for logs and CLI listings
    pub fn describe(&self) -> String {
        format!("{} {} {}", self.op_type, self.entity_kind, self.entity_id)
    }
}
