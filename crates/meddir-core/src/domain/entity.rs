//! Folder and document records
//!
//! The engine treats domain attributes (name, title, notes, ...) as an opaque
//! JSON object owned by the remote authority. It only interprets the fields it
//! needs for reconciliation: the id, the parent folder of a document, the
//! authority's file URL, the retained upload payload and the two sync flags.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::DomainError;
use super::ids::EntityId;

/// JSON object holding an entity's domain attributes
pub type Attributes = Map<String, Value>;

/// The two entity families tracked by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    #[default]
    Folder,
    Document,
}

impl EntityKind {
    /// Storage and log representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Folder => "folder",
            EntityKind::Document => "document",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "folder" => Ok(EntityKind::Folder),
            "document" => Ok(EntityKind::Document),
            other => Err(DomainError::UnknownVariant {
                what: "entity kind",
                value: other.to_string(),
            }),
        }
    }
}

/// File payload held locally until the document create has been pushed
#[derive(Clone, PartialEq, Eq)]
pub struct RetainedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl RetainedFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Payload size in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl fmt::Debug for RetainedFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetainedFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// A folder or document as held by the local store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub kind: EntityKind,
    pub id: EntityId,
    /// Owning folder; always set for documents, `None` for folders
    pub parent_folder_id: Option<EntityId>,
    pub attributes: Attributes,
    /// Download location reported by the remote authority
    pub file_url: Option<String>,
    #[serde(skip)]
    pub file: Option<RetainedFile>,
    pub synced: bool,
    pub created_offline: bool,
    pub cached_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EntityRecord {
    /// Build a record from authoritative data received during a pull
    pub fn authoritative(
        kind: EntityKind,
        id: EntityId,
        parent_folder_id: Option<EntityId>,
        attributes: Attributes,
        file_url: Option<String>,
    ) -> Self {
        Self {
            kind,
            id,
            parent_folder_id,
            attributes,
            file_url,
            file: None,
            synced: true,
            created_offline: false,
            cached_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Build an unsynced record from a locally authored draft
    ///
    /// A temporary id is assigned when the draft carries none.
    pub fn from_draft(draft: EntityDraft, file: Option<RetainedFile>) -> Self {
        let now = Utc::now();
        Self {
            kind: draft.kind,
            id: draft.id.unwrap_or_else(EntityId::new_local),
            parent_folder_id: draft.parent_folder_id,
            attributes: draft.attributes,
            file_url: None,
            file,
            synced: false,
            created_offline: true,
            cached_at: now,
            updated_at: Some(now),
        }
    }

    /// Shallow-merge `patch` into the attributes and mark the record dirty
    pub fn apply_patch(&mut self, patch: &Attributes) {
        for (key, value) in patch {
            self.attributes.insert(key.clone(), value.clone());
        }
        self.synced = false;
        self.updated_at = Some(Utc::now());
    }

    /// Human readable label (`name` for folders, `title` for documents)
    pub fn label(&self) -> Option<&str> {
        let key = match self.kind {
            EntityKind::Folder => "name",
            EntityKind::Document => "title",
        };
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// A locally authored entity that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityDraft {
    pub kind: EntityKind,
    pub id: Option<EntityId>,
    pub parent_folder_id: Option<EntityId>,
    pub attributes: Attributes,
}

impl EntityDraft {
    /// Draft of a new folder
    pub fn folder(attributes: Attributes) -> Self {
        Self {
            kind: EntityKind::Folder,
            attributes,
            ..Default::default()
        }
    }

    /// Draft of a new document inside `parent`
    pub fn document(parent: EntityId, attributes: Attributes) -> Self {
        Self {
            kind: EntityKind::Document,
            parent_folder_id: Some(parent),
            attributes,
            ..Default::default()
        }
    }
}

/// Secondary-index lookups supported by the local store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexQuery {
    /// Documents owned by a folder
    ParentFolder(EntityId),
    /// Records by `synced` flag
    Synced(bool),
    /// Records by `created_offline` flag
    CreatedOffline(bool),
}
