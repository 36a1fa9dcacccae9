//! Remote authority port (driven/secondary port)
//!
//! This module defines the interface to the server that owns the
//! authoritative copy of folders and documents. Only its HTTP contract is
//! modelled here; business rules (plans, permissions) stay on the server.
//!
//! ## Design Notes
//!
//! - Uses `#[async_trait]` for async trait methods.
//! - Deletes resolve to `Ok(())` when the entity is already gone (404).
//! - Response types accept camelCase and snake_case field names.

use serde::{Deserialize, Serialize};

use crate::domain::{Attributes, EngineResult, RemoteId, RetainedFile};

// ============================================================================
// Response types
// ============================================================================

/// A folder or document as returned by the remote authority
///
/// Fields the engine does not interpret are kept in `attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntity {
    pub id: RemoteId,
    #[serde(
        default,
        rename = "medicalFolderId",
        alias = "medical_folder_id",
        alias = "folderId",
        alias = "folder_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_folder_id: Option<RemoteId>,
    #[serde(
        default,
        rename = "fileUrl",
        alias = "file_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub file_url: Option<String>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

/// Body of `GET /folders.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderListing {
    pub folders: Vec<RemoteEntity>,
    #[serde(default, rename = "syncedAt", alias = "synced_at")]
    pub synced_at: Option<String>,
}

/// Body of `GET /folders/{id}/documents.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentListing {
    pub documents: Vec<RemoteEntity>,
    #[serde(default, rename = "medicalFolderId", alias = "medical_folder_id")]
    pub folder_id: Option<RemoteId>,
    #[serde(default, rename = "syncedAt", alias = "synced_at")]
    pub synced_at: Option<String>,
}

// ============================================================================
// IRemoteAuthority trait
// ============================================================================

/// HTTP contract of the remote authority
#[async_trait::async_trait]
pub trait IRemoteAuthority: Send + Sync {
    /// Complete list of folders
    async fn list_folders(&self) -> EngineResult<FolderListing>;

    /// Documents of one folder
    async fn list_documents(&self, folder_id: &RemoteId) -> EngineResult<DocumentListing>;

    async fn create_folder(&self, payload: &Attributes) -> EngineResult<RemoteEntity>;

    async fn update_folder(&self, id: &RemoteId, payload: &Attributes) -> EngineResult<()>;

    /// Tolerates 404
    async fn delete_folder(&self, id: &RemoteId) -> EngineResult<()>;

    /// JSON create, or multipart upload when `file` is present
    async fn create_document(
        &self,
        folder_id: &RemoteId,
        payload: &Attributes,
        file: Option<&RetainedFile>,
    ) -> EngineResult<RemoteEntity>;

    async fn update_document(
        &self,
        folder_id: &RemoteId,
        id: &RemoteId,
        payload: &Attributes,
    ) -> EngineResult<()>;

    /// Tolerates 404
    async fn delete_document(&self, folder_id: &RemoteId, id: &RemoteId) -> EngineResult<()>;
}
