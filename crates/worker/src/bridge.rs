//! Delivery of worker-originated messages to connected pages.
//!
//! Prefers replying to the client that sent the triggering request. When
//! that handle is gone (or was never known), falls back to enumerating every
//! registered client, retrying the enumeration with short increasing delays:
//! a page that just registered may not be visible on the first pass.
//! Delivery failures are logged and swallowed; callers never see an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cacheshell_core::retry::with_retry;
use cacheshell_core::{Error, WorkerMessage};
use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Handle identifying one connected page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

const ENUMERATION_DELAYS: &[Duration] = &[Duration::from_millis(100), Duration::from_millis(200)];

#[derive(Default)]
pub struct ClientBridge {
    next_id: AtomicU64,
    clients: RwLock<HashMap<ClientId, UnboundedSender<WorkerMessage>>>,
}

impl ClientBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client and get the receiving end of its message stream.
    pub async fn register(&self) -> (ClientId, UnboundedReceiver<WorkerMessage>) {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.write().await.insert(id, tx);
        (id, rx)
    }

    pub async fn unregister(&self, id: ClientId) {
        self.clients.write().await.remove(&id);
    }

    /// Deliver a message, preferring the originating client.
    pub async fn deliver(&self, source: Option<ClientId>, message: WorkerMessage) {
        if let Some(id) = source {
            let clients = self.clients.read().await;
            if let Some(sender) = clients.get(&id)
                && sender.send(message.clone()).is_ok()
            {
                return;
            }
            tracing::warn!(?id, "originating client gone, falling back to enumeration");
        }

        let result = with_retry(ENUMERATION_DELAYS, || self.broadcast(message.clone())).await;
        if let Err(err) = result {
            tracing::warn!(%err, "dropping undeliverable worker message");
        }
    }

    /// Send to every registered client; errors when none accept.
    async fn broadcast(&self, message: WorkerMessage) -> Result<(), Error> {
        let clients = self.clients.read().await;
        let mut delivered = 0usize;
        for sender in clients.values() {
            if sender.send(message.clone()).is_ok() {
                delivered += 1;
            }
        }
        if delivered > 0 {
            tracing::debug!(delivered, "worker message delivered");
            Ok(())
        } else {
            Err(Error::DeliveryFailed("no clients available".to_string()))
        }
    }
}
