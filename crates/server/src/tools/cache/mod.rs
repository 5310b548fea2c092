//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and purging cache buckets.

pub mod buckets;
pub mod get;
pub mod purge;

pub use buckets::buckets_impl;
pub use get::{CacheGetParams, get_impl};
pub use purge::{CachePurgeParams, purge_impl};
