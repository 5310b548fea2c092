//! Client code for shellcache.
//!
//! This crate provides the HTTP network interface the worker fetches
//! through, and URL resolution for request targets and manifests.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, UrlError, resolve, resolve_manifest};
