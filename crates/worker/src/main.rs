//! cacheshell worker entry point.
//!
//! Boots the worker (install, then activate) and speaks the page protocol
//! over stdio as JSON lines. Logging goes to stderr to keep stdout clean
//! for worker messages.

use std::sync::Arc;

use anyhow::Result;
use cacheshell_core::config::AppConfig;
use cacheshell_core::{PageMessage, TierStore};
use cacheshell_client::{FetchConfig, HttpFetcher};
use cacheshell_worker::CacheWorker;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(version = %config.cache_version, "starting cacheshell worker");

    let store = TierStore::open(&config.db_path).await?.with_quota(config.quota_bytes);
    let fetcher = HttpFetcher::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.timeout(),
    })?;

    let worker = Arc::new(CacheWorker::new(store, Arc::new(fetcher), config)?);
    worker.install().await;
    worker.activate().await;

    let (client_id, mut outbox) = worker.bridge().register().await;
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = outbox.recv().await {
            match serde_json::to_string(&message) {
                Ok(mut line) => {
                    line.push('\n');
                    if stdout.write_all(line.as_bytes()).await.is_err() {
                        break;
                    }
                    let _ = stdout.flush().await;
                }
                Err(err) => tracing::warn!(%err, "unserializable worker message"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }
        match PageMessage::parse(raw) {
            Ok(message) => worker.dispatch(message, Some(client_id)),
            Err(err) => tracing::warn!(%err, "rejecting malformed page message"),
        }
    }

    worker.bridge().unregister(client_id).await;
    writer.await?;
    Ok(())
}
