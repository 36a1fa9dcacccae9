//! Domain and engine error types
//!
//! [`DomainError`] covers validation of domain values (identifiers, kinds,
//! state names). [`EngineError`] is the taxonomy shared by every port: adapters
//! convert their own error types into it so the sync manager can classify
//! failures without knowing which backend produced them.

use thiserror::Error;

use super::entity::EntityKind;

/// Errors that can occur when constructing or parsing domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Invalid remote ID (empty or malformed)
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Unknown entity kind, operation type or state name
    #[error("Unknown {what}: {value}")]
    UnknownVariant {
        /// What was being parsed
        what: &'static str,
        /// The rejected input
        value: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Errors surfaced across port boundaries
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Local store miss
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of the missing record
        kind: EntityKind,
        /// Identifier that was looked up
        id: String,
    },

    /// Fetch or transport failure (no HTTP response was received)
    #[error("Network error: {0}")]
    Network(String),

    /// The remote authority answered with a non-2xx status that is not tolerated
    #[error("Remote rejected request with status {status}: {message}")]
    RemoteRejected {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The content cache ceiling cannot be satisfied even after eviction
    #[error("Cache quota exceeded: {requested} bytes requested, ceiling is {ceiling} bytes")]
    QuotaExceeded {
        /// Size of the payload that was rejected
        requested: u64,
        /// Configured ceiling
        ceiling: u64,
    },

    /// A document references a parent folder that has no authoritative id yet
    #[error("Parent folder {0} has not been synchronized yet")]
    UnresolvedParent(String),

    /// Unexpected missing index or reference in local data
    #[error("Corrupt local data: {0}")]
    Corrupt(String),

    /// Local persistence failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// A domain value failed validation
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl EngineError {
    /// Returns `true` for failures that may succeed on a later attempt
    /// without any change to local data.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Network(_) => true,
            EngineError::RemoteRejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result alias used by every port trait
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::NotFound {
            kind: EntityKind::Folder,
            id: "42".to_string(),
        };
        assert_eq!(err.to_string(), "folder not found: 42");

        let err = EngineError::RemoteRejected {
            status: 422,
            message: "name can't be blank".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Remote rejected request with status 422: name can't be blank"
        );

        let err = DomainError::UnknownVariant {
            what: "entity kind",
            value: "album".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown entity kind: album");
    }

    #[test]
    fn test_transient_classification() {
        assert!(EngineError::Network("connection reset".into()).is_transient());
        assert!(EngineError::RemoteRejected {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(EngineError::RemoteRejected {
            status: 429,
            message: String::new()
        }
        .is_transient());
        assert!(!EngineError::RemoteRejected {
            status: 422,
            message: String::new()
        }
        .is_transient());
        assert!(!EngineError::UnresolvedParent("local:x".into()).is_transient());
    }

    #[test]
    fn test_domain_error_converts() {
        let err: EngineError = DomainError::InvalidId("nope".into()).into();
        assert_eq!(err.to_string(), "Invalid ID format: nope");
    }
}
