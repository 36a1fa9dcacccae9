//! meddir Core - Domain types and ports for the offline sync engine
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `EntityRecord`, `PendingOperation`, `CacheEntry`, `SyncStatus`
//! - **Identifiers** - `EntityId` with an explicit `local` / `authoritative` provenance
//! - **Port definitions** - Traits for adapters: `ILocalStore`, `IRemoteAuthority`,
//!   `IContentFetcher`, `IConnectivity`, `IEventSink`
//! - **Configuration** - YAML-backed `Config` with validation
//!
//! # Architecture
//!
//! The domain module contains pure data types with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`meddir-store`, `meddir-remote`, `meddir-content`), and the sync
//! manager in `meddir-sync` orchestrates them through those traits.

pub mod config;
pub mod domain;
pub mod ports;
