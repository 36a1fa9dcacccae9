//! meddir Intercept - Request interception layer
//!
//! Provides:
//! - Request classification (static, document payload, API, navigation)
//! - Caching strategies over the shared [`meddir_content::CacheStore`]:
//!   cache-first, network-first with a capped dynamic cache,
//!   stale-while-revalidate and navigation with an offline page
//! - Asset pre-caching and document cache commands
//! - Relaying "sync required" and "connectivity restored" to the scheduler
//!
//! ## Modules
//!
//! - [`classify`] - `classify()` and `InterceptRequest`
//! - [`layer`] - `InterceptLayer`
//! - [`response`] - `InterceptResponse`
//! - [`service`] - message loop and `LayerHandle`

pub mod classify;
pub mod layer;
pub mod response;
pub mod service;

use meddir_core::domain::EngineError;

pub use classify::{classify, InterceptRequest, RequestClass};
pub use layer::{CacheStatus, InstallReport, InterceptLayer, SyncBridge};
pub use response::{InterceptResponse, ResponseSource};
pub use service::{LayerHandle, LayerMessage, LayerService};

/// Errors returned through a [`LayerHandle`]
#[derive(Debug, thiserror::Error)]
pub enum InterceptError {
    #[error("Interception layer service has stopped")]
    Stopped,

    #[error("Interception layer dropped the reply")]
    ReplyLost,

    #[error(transparent)]
    Engine(#[from] EngineError),
}
