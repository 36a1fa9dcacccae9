//! Port adapters over [`RemoteClient`]
//!
//! - [`HttpRemoteAuthority`] fulfils the `IRemoteAuthority` contract.
//! - [`HttpFetcher`] fulfils `IContentFetcher` for the content cache and
//!   the interception layer.
//!
//! Both share one client so connection pooling and the authentication
//! header are common to all traffic.

use std::sync::Arc;

use meddir_core::{
    domain::{Attributes, EngineResult, RemoteId, RetainedFile},
    ports::{
        DocumentListing, FetchResponse, FolderListing, IContentFetcher, IRemoteAuthority,
        RemoteEntity,
    },
};

use crate::client::RemoteClient;

/// `IRemoteAuthority` backed by the JSON HTTP API
#[derive(Clone)]
pub struct HttpRemoteAuthority {
    client: Arc<RemoteClient>,
}

impl HttpRemoteAuthority {
    pub fn new(client: Arc<RemoteClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<RemoteClient> {
        &self.client
    }
}

#[async_trait::async_trait]
impl IRemoteAuthority for HttpRemoteAuthority {
    async fn list_folders(&self) -> EngineResult<FolderListing> {
        Ok(self.client.list_folders().await?)
    }

    async fn list_documents(&self, folder_id: &RemoteId) -> EngineResult<DocumentListing> {
        Ok(self.client.list_documents(folder_id).await?)
    }

    async fn create_folder(&self, payload: &Attributes) -> EngineResult<RemoteEntity> {
        Ok(self.client.create_folder(payload).await?)
    }

    async fn update_folder(&self, id: &RemoteId, payload: &Attributes) -> EngineResult<()> {
        Ok(self.client.update_folder(id, payload).await?)
    }

    async fn delete_folder(&self, id: &RemoteId) -> EngineResult<()> {
        Ok(self.client.delete_folder(id).await?)
    }

    async fn create_document(
        &self,
        folder_id: &RemoteId,
        payload: &Attributes,
        file: Option<&RetainedFile>,
    ) -> EngineResult<RemoteEntity> {
        Ok(self.client.create_document(folder_id, payload, file).await?)
    }

    async fn update_document(
        &self,
        folder_id: &RemoteId,
        id: &RemoteId,
        payload: &Attributes,
    ) -> EngineResult<()> {
        Ok(self.client.update_document(folder_id, id, payload).await?)
    }

    async fn delete_document(&self, folder_id: &RemoteId, id: &RemoteId) -> EngineResult<()> {
        Ok(self.client.delete_document(folder_id, id).await?)
    }
}

/// `IContentFetcher` issuing plain GETs through the shared client
#[derive(Clone)]
pub struct HttpFetcher {
    client: Arc<RemoteClient>,
}

impl HttpFetcher {
    pub fn new(client: Arc<RemoteClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl IContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> EngineResult<FetchResponse> {
        Ok(self.client.get_bytes(url).await?)
    }
}
