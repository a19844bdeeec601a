//! Database connection management with pragma configuration.
//!
//! This module handles opening the SQLite store that backs all cache tiers,
//! applying required pragmas for performance and concurrency (WAL mode), and
//! running migrations. The store is the single source of truth: the worker
//! keeps no in-memory copy of any tier, and every query re-reads storage, so
//! tier contents survive worker restarts.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

/// Tier store handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. An optional byte budget stands in for the
/// platform storage quota: writes that would exceed it fail with
/// [`Error::QuotaExceeded`].
#[derive(Clone, Debug)]
pub struct TierStore {
    pub(crate) conn: Connection,
    pub(crate) quota_bytes: Option<u64>,
}

impl TierStore {
    /// Open a store at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// Open an in-memory store for testing.
    ///
    /// Creates a temporary in-memory SQLite database with the same
    /// pragma configuration as file-based stores.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// Set the total byte budget across all tiers.
    pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;
                 PRAGMA temp_store=MEMORY;
                 PRAGMA foreign_keys=ON;",
            )?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn, quota_bytes: None })
    }
}
