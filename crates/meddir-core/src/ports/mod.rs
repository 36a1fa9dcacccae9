//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync manager and
//! the interception layer depend on, but whose implementations live in
//! adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ILocalStore`] - Entities, pending-operation log and metadata
//! - [`IRemoteAuthority`] - HTTP contract of the remote authority
//! - [`IContentFetcher`] - Plain GET used for binary payloads and page assets
//! - [`IConnectivity`] - Network reachability signal
//! - [`IEventSink`] - Lifecycle and progress events

pub mod connectivity;
pub mod content_fetcher;
pub mod events;
pub mod local_store;
pub mod remote_authority;

pub use connectivity::IConnectivity;
pub use content_fetcher::{FetchResponse, IContentFetcher};
pub use events::{EngineEvent, IEventSink, NullEventSink};
pub use local_store::{ILocalStore, LAST_SYNC_TIME_KEY};
pub use remote_authority::{DocumentListing, FolderListing, IRemoteAuthority, RemoteEntity};
