//! Core types and shared functionality for cacheshell.
//!
//! This crate provides:
//! - The SQLite-backed tier store
//! - Tier configuration with versioned naming
//! - The application-shell precache manifest
//! - The page⇄worker message protocol
//! - Bounded retry, configuration, and unified error types

pub mod cache;
pub mod config;
pub mod error;
pub mod protocol;
pub mod retry;
pub mod shell;
pub mod tiers;

pub use cache::{StoredResponse, TierStore};
pub use error::Error;
pub use protocol::{ApiFieldStatus, CacheStatus, PageMessage, WorkerMessage};
pub use tiers::{TierConfig, TierKind, TierPolicy};
