//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Cache storage abstraction with in-memory and SQLite backends
//! - Cache lifecycle (install / activate) keyed by generation
//! - Fetch routing with network-first and cache-first strategies
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod request;
pub mod router;
pub mod worker;

#[cfg(test)]
mod testing;

pub use cache::{Bucket, CacheDb, CacheStorage, EntryMeta, MemoryStorage, RequestKey};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use lifecycle::{ActivateOutcome, GenerationId, InstallOutcome, LifecycleManager};
pub use request::{Fetcher, SiteRequest, StoredResponse};
pub use router::{FetchRouter, ResponseSource, RouteRule, RouteTable, Routed, Strategy};
pub use worker::{ClientInfo, Clients, ServiceWorker, WorkerState};
