//! Message loop in front of the interception layer
//!
//! The embedding application talks to the layer through a cloneable
//! [`LayerHandle`]. Commands carry a oneshot sender for their reply;
//! signals are fire-and-forget. [`LayerService::run`] processes messages
//! one at a time and, when given a connectivity receiver, relays every
//! offline-to-online transition to the layer.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    layer::{CacheStatus, InterceptLayer},
    InterceptError,
};

/// Result type for [`LayerHandle`] commands
pub type Result<T> = std::result::Result<T, InterceptError>;

/// Messages accepted by the layer
#[derive(Debug)]
pub enum LayerMessage {
    /// Download a document payload into the document cache
    CacheDocument {
        url: String,
        reply: oneshot::Sender<bool>,
    },

    /// Drop every cached document payload
    ClearDocumentCache {
        reply: oneshot::Sender<Result<usize>>,
    },

    /// Entry counts per bucket
    GetCacheStatus {
        reply: oneshot::Sender<Result<CacheStatus>>,
    },

    /// Local changes need pushing
    SyncRequired,
}

// ============================================================================
// LayerHandle
// ============================================================================

#[derive(Debug, Clone)]
pub struct LayerHandle {
    tx: mpsc::Sender<LayerMessage>,
}

impl LayerHandle {
    pub async fn cache_document(&self, url: impl Into<String>) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(LayerMessage::CacheDocument {
            url: url.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| InterceptError::ReplyLost)
    }

    pub async fn clear_document_cache(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(LayerMessage::ClearDocumentCache { reply }).await?;
        rx.await.map_err(|_| InterceptError::ReplyLost)?
    }

    pub async fn cache_status(&self) -> Result<CacheStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(LayerMessage::GetCacheStatus { reply }).await?;
        rx.await.map_err(|_| InterceptError::ReplyLost)?
    }

    /// Reports local changes. Returns `false` if the service has stopped.
    pub fn sync_required(&self) -> bool {
        match self.tx.try_send(LayerMessage::SyncRequired) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Layer busy, sync-required signal dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    async fn send(&self, message: LayerMessage) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| InterceptError::Stopped)
    }
}

// ============================================================================
// LayerService
// ============================================================================

pub struct LayerService {
    layer: Arc<InterceptLayer>,
    rx: mpsc::Receiver<LayerMessage>,
    connectivity: Option<watch::Receiver<bool>>,
}

impl LayerService {
    pub fn new(layer: Arc<InterceptLayer>) -> (Self, LayerHandle) {
        let (tx, rx) = mpsc::channel(32);
        let service = Self {
            layer,
            rx,
            connectivity: None,
        };
        (service, LayerHandle { tx })
    }

    /// Relays offline-to-online transitions to the layer
    pub fn watch_connectivity(mut self, online: watch::Receiver<bool>) -> Self {
        self.connectivity = Some(online);
        self
    }

    /// Runs until `cancel` fires or every handle is dropped
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Interception layer service started");
        let mut last_online = self
            .connectivity
            .as_mut()
            .map_or(true, |rx| *rx.borrow_and_update());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = connectivity_changed(&mut self.connectivity) => {
                    if !changed {
                        self.connectivity = None;
                        continue;
                    }
                    let online = self
                        .connectivity
                        .as_mut()
                        .map_or(last_online, |rx| *rx.borrow_and_update());
                    if online && !last_online {
                        self.layer.on_connectivity_restored();
                    }
                    last_online = online;
                }
                message = self.rx.recv() => match message {
                    Some(message) => self.process(message).await,
                    None => break,
                },
            }
        }

        info!("Interception layer service stopped");
    }

    async fn process(&self, message: LayerMessage) {
        match message {
            LayerMessage::CacheDocument { url, reply } => {
                let cached = self.layer.cache_document(&url).await;
                let _ = reply.send(cached);
            }
            LayerMessage::ClearDocumentCache { reply } => {
                let result = self.layer.clear_document_cache().await.map_err(Into::into);
                let _ = reply.send(result);
            }
            LayerMessage::GetCacheStatus { reply } => {
                let result = self.layer.cache_status().await.map_err(Into::into);
                let _ = reply.send(result);
            }
            LayerMessage::SyncRequired => {
                if !self.layer.on_sync_required() {
                    debug!("Sync-required signal not forwarded");
                }
            }
        }
    }
}

/// Resolves when the watched value changes; `false` once the sender is gone
async fn connectivity_changed(connectivity: &mut Option<watch::Receiver<bool>>) -> bool {
    match connectivity {
        Some(rx) => match rx.changed().await {
            Ok(()) => true,
            Err(_) => {
                warn!("Connectivity monitor dropped");
                false
            }
        },
        None => std::future::pending().await,
    }
}
