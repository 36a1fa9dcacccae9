//! Entity identifiers with explicit provenance
//!
//! An entity is identified either by a [`LocalId`], generated on this device
//! while the remote authority has not seen the entity yet, or by a
//! [`RemoteId`] assigned by the remote authority. [`EntityId`] keeps the two
//! apart in the type system and in storage (the origin is part of every key),
//! so the two id spaces can never collide.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// LocalId
// ============================================================================

/// A locally generated, time-ordered identifier (UUIDv7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(Uuid);

impl LocalId {
    /// Create a new LocalId for the current instant
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for LocalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocalId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid LocalId: {e}")))
    }
}

// ============================================================================
// RemoteId
// ============================================================================

/// Identifier assigned by the remote authority
///
/// The authority may send ids as JSON strings or integers; both are
/// normalized to their decimal/text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    /// Create a RemoteId, rejecting empty values
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidRemoteId(
                "remote id cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for RemoteId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for RemoteId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(RemoteId::from(n)),
            Raw::Text(s) => RemoteId::new(s).map_err(serde::de::Error::custom),
        }
    }
}

// ============================================================================
// EntityId
// ============================================================================

/// Where an identifier came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdOrigin {
    /// Generated on this device
    Local,
    /// Assigned by the remote authority
    Authoritative,
}

impl IdOrigin {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            IdOrigin::Local => "local",
            IdOrigin::Authoritative => "authoritative",
        }
    }
}

impl FromStr for IdOrigin {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(IdOrigin::Local),
            "authoritative" => Ok(IdOrigin::Authoritative),
            other => Err(DomainError::UnknownVariant {
                what: "id origin",
                value: other.to_string(),
            }),
        }
    }
}

/// Identifier of a folder or document, tagged with its provenance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "origin", content = "value", rename_all = "snake_case")]
pub enum EntityId {
    /// Temporary id for an entity the remote authority has not acknowledged
    Local(LocalId),
    /// Id assigned by the remote authority
    Authoritative(RemoteId),
}

impl EntityId {
    /// Generate a fresh temporary identifier
    #[must_use]
    pub fn new_local() -> Self {
        EntityId::Local(LocalId::new())
    }

    /// Returns the provenance of this id
    pub fn origin(&self) -> IdOrigin {
        match self {
            EntityId::Local(_) => IdOrigin::Local,
            EntityId::Authoritative(_) => IdOrigin::Authoritative,
        }
    }

    /// Returns `true` if the id has not been remapped yet
    pub fn is_local(&self) -> bool {
        matches!(self, EntityId::Local(_))
    }

    /// Returns the authoritative id, if any
    pub fn as_remote(&self) -> Option<&RemoteId> {
        match self {
            EntityId::Authoritative(id) => Some(id),
            EntityId::Local(_) => None,
        }
    }

    /// Value column as stored next to the origin column
    pub fn storage_value(&self) -> String {
        match self {
            EntityId::Local(id) => id.to_string(),
            EntityId::Authoritative(id) => id.as_str().to_string(),
        }
    }

    /// Rebuild an id from its stored origin and value columns
    pub fn from_parts(origin: &str, value: &str) -> Result<Self, DomainError> {
        match origin.parse::<IdOrigin>()? {
            IdOrigin::Local => Ok(EntityId::Local(value.parse()?)),
            IdOrigin::Authoritative => Ok(EntityId::Authoritative(RemoteId::new(value)?)),
        }
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Local(id) => write!(f, "local:{id}"),
            EntityId::Authoritative(id) => write!(f, "{id}"),
        }
    }
}

impl From<RemoteId> for EntityId {
    fn from(id: RemoteId) -> Self {
        EntityId::Authoritative(id)
    }
}

impl From<LocalId> for EntityId {
    fn from(id: LocalId) -> Self {
        EntityId::Local(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ids_are_unique() {
        let a = LocalId::new();
        let b = LocalId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_uuid().get_version_num(), 7);
    }

    #[test]
    fn remote_id_rejects_empty() {
        assert!(RemoteId::new("").is_err());
        assert!(RemoteId::new("   ").is_err());
        assert_eq!(RemoteId::new("17").unwrap().as_str(), "17");
    }

    #[test]
    fn remote_id_deserializes_from_number_or_string() {
        let from_number: RemoteId = serde_json::from_str("42").unwrap();
        let from_text: RemoteId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(from_number, from_text);
        assert!(serde_json::from_str::<RemoteId>("\"\"").is_err());
    }

    #[test]
    fn entity_id_round_trips_through_storage_parts() {
        let local = EntityId::new_local();
        let parsed = EntityId::from_parts(local.origin().as_str(), &local.storage_value()).unwrap();
        assert_eq!(parsed, local);

        let remote = EntityId::from(RemoteId::from(7));
        let parsed =
            EntityId::from_parts(remote.origin().as_str(), &remote.storage_value()).unwrap();
        assert_eq!(parsed, remote);
    }

    #[test]
    fn entity_id_rejects_unknown_origin() {
        let err = EntityId::from_parts("temp", "123").unwrap_err();
        assert!(matches!(err, DomainError::UnknownVariant { .. }));
    }

    #[test]
    fn local_and_remote_with_same_text_are_distinct() {
        let local = LocalId::new();
        let remote = EntityId::Authoritative(RemoteId::new(local.to_string()).unwrap());
        assert_ne!(EntityId::Local(local), remote);
        assert!(EntityId::Local(local).is_local());
        assert!(remote.as_remote().is_some());
    }

    #[test]
    fn entity_id_serializes_with_origin_tag() {
        let id = EntityId::from(RemoteId::from(5));
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json["origin"], "authoritative");
        assert_eq!(json["value"], "5");
    }
}
