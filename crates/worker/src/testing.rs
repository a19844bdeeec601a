//! Shared test fixtures: an in-memory worker and a scriptable fetcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use cacheshell_core::config::AppConfig;
use cacheshell_core::{Error, StoredResponse, TierStore};
use cacheshell_client::{Fetch, FetchResponse};
use url::Url;

use crate::worker::CacheWorker;

/// A network that serves whatever the test scripted, keyed by pathname.
/// Unknown paths get a 404; `set_offline` makes every fetch fail; per-path
/// delays simulate slow endpoints under paused time.
#[derive(Default)]
pub(crate) struct StubFetcher {
    responses: Mutex<HashMap<String, (u16, String, Vec<u8>)>>,
    delays: Mutex<HashMap<String, Duration>>,
    offline: AtomicBool,
    fetches: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub(crate) fn insert(&self, path: &str, status: u16, content_type: &str, body: &[u8]) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, content_type.to_string(), body.to_vec()));
    }

    pub(crate) fn remove(&self, path: &str) {
        self.responses.lock().unwrap().remove(path);
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn set_delay(&self, path: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(path.to_string(), delay);
    }

    pub(crate) fn fetch_count(&self, path: &str) -> usize {
        self.fetches.lock().unwrap().iter().filter(|p| p.as_str() == path).count()
    }

    pub(crate) fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetch for StubFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, Error> {
        let path = url.path().to_string();
        self.fetches.lock().unwrap().push(path.clone());

        let delay = self.delays.lock().unwrap().get(&path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::HttpError("network unreachable".to_string()));
        }

        let scripted = self.responses.lock().unwrap().get(&path).cloned();
        let (status, content_type, body) = match scripted {
            Some(response) => response,
            None => (404, "text/plain".to_string(), b"not found".to_vec()),
        };

        Ok(FetchResponse {
            url: url.clone(),
            final_url: url.clone(),
            status,
            content_type: Some(content_type),
            bytes: Bytes::from(body),
            fetch_ms: 1,
        })
    }
}

pub(crate) async fn test_worker() -> (Arc<CacheWorker>, Arc<StubFetcher>) {
    test_worker_with_quota(None).await
}

pub(crate) async fn test_worker_with_quota(quota: Option<u64>) -> (Arc<CacheWorker>, Arc<StubFetcher>) {
    let store = TierStore::open_in_memory().await.unwrap().with_quota(quota);
    build(store, "v1.0.0")
}

/// A worker for another build version sharing an existing store.
pub(crate) async fn test_worker_with_version(store: TierStore, version: &str) -> (Arc<CacheWorker>, Arc<StubFetcher>) {
    build(store, version)
}

fn build(store: TierStore, version: &str) -> (Arc<CacheWorker>, Arc<StubFetcher>) {
    let stub = Arc::new(StubFetcher::default());
    let config = AppConfig { cache_version: version.to_string(), ..Default::default() };
    let fetcher: Arc<dyn Fetch> = stub.clone();
    let worker = Arc::new(CacheWorker::new(store, fetcher, config).unwrap());
    (worker, stub)
}

/// Put one entry directly into a tier (the tier must already be open).
pub(crate) async fn seed_entry(worker: &CacheWorker, tier: &str, key: &str, status: u16, content_type: &str, body: &[u8]) {
    let response = StoredResponse::new(key, status, Some(content_type.to_string()), body.to_vec());
    worker.store.put_entry(tier, key, &response).await.unwrap();
}

/// Script every shell manifest URL on the stub network.
pub(crate) fn seed_shell_endpoints(stub: &StubFetcher) {
    stub.insert("/", 200, "text/html", b"<html>shell</html>");
    stub.insert("/offline", 200, "text/html", b"<html>offline</html>");
    for image in cacheshell_core::shell::PRECACHED_IMAGES {
        stub.insert(image, 200, "image/webp", b"image bytes");
    }
    stub.insert("/worker.js", 200, "text/javascript", b"// worker");
}
