//! Entry CRUD and lookup operations.
//!
//! Cache keys are full URLs, never digests: the fallback resolver and the
//! health probes both scan keys by pathname to tolerate opaque revision
//! query parameters, which only works if the key stays URL-shaped.

use super::connection::TierStore;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, Row};
use url::Url;

/// A stored response: the opaque value half of a cached (key, response) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl StoredResponse {
    /// Build a response stamped with the current time.
    pub fn new(url: impl Into<String>, status: u16, content_type: Option<String>, body: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            status,
            content_type,
            body,
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

fn map_row(row: &Row<'_>) -> Result<StoredResponse, rusqlite::Error> {
    Ok(StoredResponse {
        url: row.get(0)?,
        status: row.get::<_, i64>(1)? as u16,
        content_type: row.get(2)?,
        body: row.get(3)?,
        stored_at: row.get(4)?,
    })
}

const SELECT_COLUMNS: &str = "url, status, content_type, body, stored_at";

/// Strip the query string from a URL-shaped cache key.
fn without_query(key: &str) -> &str {
    key.split('?').next().unwrap_or(key)
}

/// Pathname of a URL-shaped cache key, if it parses.
fn key_pathname(key: &str) -> Option<String> {
    Url::parse(key).map(|u| u.path().to_string()).ok()
}

impl TierStore {
    /// Insert or replace an entry in a tier.
    ///
    /// The tier must exist. If the store carries a byte budget and the write
    /// would exceed it, fails with [`Error::QuotaExceeded`] without writing.
    pub async fn put_entry(&self, tier: &str, cache_key: &str, response: &StoredResponse) -> Result<(), Error> {
        let tier = tier.to_string();
        let cache_key = cache_key.to_string();
        let response = response.clone();
        let quota = self.quota_bytes;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                if let Some(quota) = quota {
                    let occupied: i64 = conn.query_row(
                        "SELECT COALESCE(SUM(LENGTH(body)), 0) FROM entries
                         WHERE NOT (tier = ?1 AND cache_key = ?2)",
                        params![tier, cache_key],
                        |row| row.get(0),
                    )?;
                    if occupied as u64 + response.body.len() as u64 > quota {
                        return Err(Error::QuotaExceeded(tier.clone()));
                    }
                }

                conn.execute(
                    "INSERT OR REPLACE INTO entries (tier, cache_key, url, status, content_type, body, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        tier,
                        cache_key,
                        response.url,
                        response.status as i64,
                        response.content_type,
                        response.body,
                        response.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry by exact cache key.
    pub async fn match_exact(&self, tier: &str, cache_key: &str) -> Result<Option<StoredResponse>, Error> {
        let tier = tier.to_string();
        let cache_key = cache_key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let result = conn.query_row(
                    &format!("SELECT {SELECT_COLUMNS} FROM entries WHERE tier = ?1 AND cache_key = ?2"),
                    params![tier, cache_key],
                    map_row,
                );
                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry by cache key, ignoring any query string on either side.
    pub async fn match_ignoring_search(&self, tier: &str, cache_key: &str) -> Result<Option<StoredResponse>, Error> {
        let tier = tier.to_string();
        let base = without_query(cache_key).to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let result = conn.query_row(
                    &format!(
                        "SELECT {SELECT_COLUMNS} FROM entries
                         WHERE tier = ?1 AND (cache_key = ?2 OR cache_key LIKE ?2 || '?%')
                         ORDER BY stored_at DESC LIMIT 1"
                    ),
                    params![tier, base],
                    map_row,
                );
                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Scan a tier's keys and return the first entry whose URL pathname matches.
    pub async fn match_pathname(&self, tier: &str, pathname: &str) -> Result<Option<StoredResponse>, Error> {
        let tier = tier.to_string();
        let pathname = pathname.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT cache_key, {SELECT_COLUMNS} FROM entries WHERE tier = ?1 ORDER BY stored_at DESC"
                ))?;
                let mut rows = stmt.query(params![tier])?;
                while let Some(row) = rows.next()? {
                    let key: String = row.get(0)?;
                    if key_pathname(&key).as_deref() == Some(pathname.as_str()) {
                        return Ok(Some(StoredResponse {
                            url: row.get(1)?,
                            status: row.get::<_, i64>(2)? as u16,
                            content_type: row.get(3)?,
                            body: row.get(4)?,
                            stored_at: row.get(5)?,
                        }));
                    }
                }
                Ok(None)
            })
            .await
            .map_err(Error::from)
    }

    /// Search every tier: exact key first, then a pathname scan over all keys.
    pub async fn match_any_tier(&self, cache_key: &str, pathname: &str) -> Result<Option<StoredResponse>, Error> {
        let cache_key = cache_key.to_string();
        let pathname = pathname.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let exact = conn.query_row(
                    &format!("SELECT {SELECT_COLUMNS} FROM entries WHERE cache_key = ?1 ORDER BY stored_at DESC LIMIT 1"),
                    params![cache_key],
                    map_row,
                );
                match exact {
                    Ok(r) => return Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => {}
                    Err(e) => return Err(e.into()),
                }

                let mut stmt = conn.prepare(&format!(
                    "SELECT cache_key, {SELECT_COLUMNS} FROM entries ORDER BY stored_at DESC"
                ))?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    let key: String = row.get(0)?;
                    if key_pathname(&key).as_deref() == Some(pathname.as_str()) {
                        return Ok(Some(StoredResponse {
                            url: row.get(1)?,
                            status: row.get::<_, i64>(2)? as u16,
                            content_type: row.get(3)?,
                            body: row.get(4)?,
                            stored_at: row.get(5)?,
                        }));
                    }
                }
                Ok(None)
            })
            .await
            .map_err(Error::from)
    }

    /// All cache keys stored in a tier, newest first.
    pub async fn entry_keys(&self, tier: &str) -> Result<Vec<String>, Error> {
        let tier = tier.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt =
                    conn.prepare("SELECT cache_key FROM entries WHERE tier = ?1 ORDER BY stored_at DESC")?;
                let keys = stmt
                    .query_map(params![tier], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(Error::from)?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Apply a tier's expiration policy: drop entries past max age, then the
    /// oldest entries beyond the entry cap.
    ///
    /// Returns the number of evicted entries.
    pub async fn evict(&self, tier: &str, max_entries: u32, max_age_seconds: Option<u64>) -> Result<u64, Error> {
        let tier_name = tier.to_string();
        let evicted = self
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let mut evicted = 0u64;

                if let Some(max_age) = max_age_seconds {
                    let cutoff = (chrono::Utc::now() - chrono::Duration::seconds(max_age as i64)).to_rfc3339();
                    evicted += conn.execute(
                        "DELETE FROM entries WHERE tier = ?1 AND stored_at < ?2",
                        params![tier_name, cutoff],
                    )? as u64;
                }

                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries WHERE tier = ?1",
                    params![tier_name],
                    |row| row.get(0),
                )?;
                if count > max_entries as i64 {
                    evicted += conn.execute(
                        "DELETE FROM entries WHERE tier = ?1 AND cache_key IN (
                            SELECT cache_key FROM entries WHERE tier = ?1 ORDER BY stored_at ASC LIMIT ?2
                        )",
                        params![tier_name, count - max_entries as i64],
                    )? as u64;
                }

                Ok(evicted)
            })
            .await
            .map_err(Error::from)?;

        if evicted > 0 {
            self.record_eviction(tier, evicted).await?;
        }
        Ok(evicted)
    }

    /// Delete every entry in a tier, keeping the tier itself.
    pub async fn purge_tier(&self, tier: &str) -> Result<u64, Error> {
        let tier = tier.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let deleted = conn.execute("DELETE FROM entries WHERE tier = ?1", params![tier])?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Total stored body bytes across all tiers.
    pub async fn total_bytes(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let total: i64 =
                    conn.query_row("SELECT COALESCE(SUM(LENGTH(body)), 0) FROM entries", [], |row| row.get(0))?;
                Ok(total as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_tier(tier: &str) -> TierStore {
        let store = TierStore::open_in_memory().await.unwrap();
        store.open_tier(tier).await.unwrap();
        store
    }

    fn response(url: &str, body: &[u8]) -> StoredResponse {
        StoredResponse::new(url, 200, Some("text/plain".to_string()), body.to_vec())
    }

    #[tokio::test]
    async fn test_put_and_match_exact() {
        let store = store_with_tier("pages-runtime-v1").await;
        let key = "https://app.example/page";
        store
            .put_entry("pages-runtime-v1", key, &response(key, b"hello"))
            .await
            .unwrap();

        let hit = store.match_exact("pages-runtime-v1", key).await.unwrap().unwrap();
        assert_eq!(hit.body, b"hello");
        assert!(store.match_exact("pages-runtime-v1", "https://app.example/other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_match_ignoring_search() {
        let store = store_with_tier("static-runtime-v1").await;
        let key = "https://app.example/app.css?rev=abc";
        store
            .put_entry("static-runtime-v1", key, &response(key, b"body{}"))
            .await
            .unwrap();

        let hit = store
            .match_ignoring_search("static-runtime-v1", "https://app.example/app.css")
            .await
            .unwrap();
        assert!(hit.is_some());
    }

    #[tokio::test]
    async fn test_match_pathname_tolerates_revision_params() {
        let store = store_with_tier("precache-v1").await;
        let key = "https://app.example/offline?rev=offline-v1";
        store.put_entry("precache-v1", key, &response(key, b"<html>")).await.unwrap();

        let hit = store.match_pathname("precache-v1", "/offline").await.unwrap();
        assert!(hit.is_some());
        assert!(store.match_pathname("precache-v1", "/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_match_any_tier() {
        let store = store_with_tier("images-runtime-v1").await;
        store.open_tier("api-runtime-v1").await.unwrap();
        let key = "https://app.example/api/flag?c=ie";
        store.put_entry("api-runtime-v1", key, &response(key, b"png")).await.unwrap();

        let hit = store
            .match_any_tier("https://app.example/api/flag", "/api/flag")
            .await
            .unwrap();
        assert!(hit.is_some());
    }

    #[tokio::test]
    async fn test_evict_by_count_drops_oldest() {
        let store = store_with_tier("images-runtime-v1").await;
        for i in 0..4 {
            let key = format!("https://app.example/img/{i}");
            let mut resp = response(&key, b"x");
            // Distinct timestamps so insertion order is unambiguous.
            resp.stored_at = format!("2026-01-01T00:00:0{i}+00:00");
            store.put_entry("images-runtime-v1", &key, &resp).await.unwrap();
        }

        let evicted = store.evict("images-runtime-v1", 2, None).await.unwrap();
        assert_eq!(evicted, 2);

        let keys = store.entry_keys("images-runtime-v1").await.unwrap();
        assert_eq!(keys, vec![
            "https://app.example/img/3".to_string(),
            "https://app.example/img/2".to_string(),
        ]);
    }

    #[tokio::test]
    async fn test_evict_by_age() {
        let store = store_with_tier("api-runtime-v1").await;
        let key = "https://app.example/api/cardData";
        let mut resp = response(key, b"{}");
        resp.stored_at = "2020-01-01T00:00:00+00:00".to_string();
        store.put_entry("api-runtime-v1", key, &resp).await.unwrap();

        let evicted = store.evict("api-runtime-v1", 50, Some(300)).await.unwrap();
        assert_eq!(evicted, 1);
        assert_eq!(store.tier_len("api-runtime-v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_quota_rejects_oversized_write() {
        let store = TierStore::open_in_memory().await.unwrap().with_quota(Some(8));
        store.open_tier("images-runtime-v1").await.unwrap();

        let key = "https://app.example/img/big";
        let err = store
            .put_entry("images-runtime-v1", key, &response(key, b"0123456789"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded(_)));

        // Replacing an existing entry accounts for the bytes it frees.
        store.put_entry("images-runtime-v1", key, &response(key, b"1234")).await.unwrap();
        store.put_entry("images-runtime-v1", key, &response(key, b"12345678")).await.unwrap();
    }

    #[tokio::test]
    async fn test_purge_tier_keeps_tier() {
        let store = store_with_tier("pages-runtime-v1").await;
        let key = "https://app.example/about";
        store.put_entry("pages-runtime-v1", key, &response(key, b"hi")).await.unwrap();

        assert_eq!(store.purge_tier("pages-runtime-v1").await.unwrap(), 1);
        assert!(store.has_tier("pages-runtime-v1").await.unwrap());
        assert_eq!(store.tier_len("pages-runtime-v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_tier_cascades_entries() {
        let store = store_with_tier("pages-runtime-v1").await;
        let key = "https://app.example/about";
        store.put_entry("pages-runtime-v1", key, &response(key, b"hi")).await.unwrap();

        store.delete_tier("pages-runtime-v1").await.unwrap();
        assert_eq!(store.total_bytes().await.unwrap(), 0);
    }
}
