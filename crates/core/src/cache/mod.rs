//! SQLite-backed store for named cache tiers.
//!
//! This module provides the persistent storage subsystem that owns every
//! tier and entry, using SQLite with async access via tokio-rusqlite. It
//! supports:
//!
//! - Named tiers holding opaque (cache key, response) pairs
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Exact, ignore-search, and pathname-scan lookups
//! - Entry-count and max-age eviction with per-tier bookkeeping
//! - An optional byte budget standing in for platform storage quota

pub mod connection;
pub mod entries;
pub mod migrations;
pub mod registry;

pub use crate::Error;

pub use connection::TierStore;
pub use entries::StoredResponse;
