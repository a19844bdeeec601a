//! Tier registry operations.
//!
//! A tier is a named, independently-addressable cache bucket. The registry
//! row is what makes a tier "exist"; deleting it cascades to the tier's
//! entries. Eviction bookkeeping lives in a separate side table that is not
//! covered by the cascade, so deleting a tier can strand a meta row until
//! the activation sweep reclaims it.

use super::connection::TierStore;
use crate::Error;
use tokio_rusqlite::params;

impl TierStore {
    /// Open a tier, creating the registry row if it doesn't exist.
    pub async fn open_tier(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO tiers (name, created_at) VALUES (?1, ?2)",
                    params![name, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether a tier exists.
    pub async fn has_tier(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn
                    .query_row("SELECT EXISTS(SELECT 1 FROM tiers WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })
                    .map_err(Error::from)?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a tier and all of its entries.
    ///
    /// Returns true if the tier existed.
    pub async fn delete_tier(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM tiers WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// All tier names currently present, in creation order.
    pub async fn tier_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM tiers ORDER BY created_at, name")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(Error::from)?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries stored in a tier.
    pub async fn tier_len(&self, name: &str) -> Result<u64, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM entries WHERE tier = ?1", params![name], |row| {
                        row.get(0)
                    })
                    .map_err(Error::from)?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Record that eviction removed entries from a tier.
    pub async fn record_eviction(&self, name: &str, evicted: u64) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO tier_meta (tier, evictions, last_evicted_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(tier) DO UPDATE SET
                        evictions = evictions + excluded.evictions,
                        last_evicted_at = excluded.last_evicted_at",
                    params![name, evicted as i64, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Tier names that have eviction bookkeeping rows.
    pub async fn meta_tiers(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT tier FROM tier_meta ORDER BY tier")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(Error::from)?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a tier's eviction bookkeeping row.
    ///
    /// Returns true if a row was removed.
    pub async fn delete_tier_meta(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM tier_meta WHERE tier = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
