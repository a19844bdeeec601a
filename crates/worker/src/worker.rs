//! The worker itself: wiring plus the two entry points (fetch dispatch and
//! page message dispatch).

use std::sync::{Arc, RwLock};

use cacheshell_core::config::AppConfig;
use cacheshell_core::{Error, PageMessage, StoredResponse, TierConfig, TierStore};
use cacheshell_client::Fetch;
use url::Url;

use crate::bridge::{ClientBridge, ClientId};
use crate::lifecycle::WorkerState;
use crate::router::{self, RequestContext};
use crate::{fallback, health, reset, strategy};

pub struct CacheWorker {
    pub(crate) store: TierStore,
    pub(crate) fetcher: Arc<dyn Fetch>,
    pub(crate) config: AppConfig,
    pub(crate) tiers: TierConfig,
    pub(crate) origin: Url,
    pub(crate) bridge: ClientBridge,
    pub(crate) state: RwLock<WorkerState>,
}

impl CacheWorker {
    pub fn new(store: TierStore, fetcher: Arc<dyn Fetch>, config: AppConfig) -> Result<Self, Error> {
        let origin = config.origin().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let tiers = TierConfig::for_version(&config.cache_version);
        Ok(Self {
            store,
            fetcher,
            config,
            tiers,
            origin,
            bridge: ClientBridge::new(),
            state: RwLock::new(WorkerState::Installing),
        })
    }

    pub fn bridge(&self) -> &ClientBridge {
        &self.bridge
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        *self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }

    /// Serve one intercepted request: route, run the strategy, and only if
    /// the strategy itself fails, walk the fallback chain.
    pub async fn handle_fetch(self: &Arc<Self>, ctx: &RequestContext) -> Result<StoredResponse, Error> {
        let route = router::route(ctx);
        match strategy::run_route(self, ctx, route).await {
            Ok(response) => Ok(response),
            Err(err) => {
                tracing::debug!(url = %ctx.url, %err, "strategy failed, resolving fallback");
                fallback::resolve(self, ctx).await
            }
        }
    }

    /// Dispatch one validated page message.
    ///
    /// Long-running operations are spawned so one health stream never
    /// blocks the next message; each spawned task is the event's registered
    /// pending work.
    pub fn dispatch(self: &Arc<Self>, message: PageMessage, source: Option<ClientId>) {
        tracing::info!(?message, "dispatching page message");
        let worker = Arc::clone(self);
        match message {
            PageMessage::SkipWaiting => {
                tokio::spawn(async move { worker.skip_waiting().await });
            }
            PageMessage::ClearAllCaches => {
                tokio::spawn(async move { reset::clear_all(&worker, source).await });
            }
            PageMessage::PrecacheStatus => {
                tokio::spawn(async move { health::precache::run(&worker, source).await });
            }
            PageMessage::ApiRuntimeCacheStatus => {
                tokio::spawn(async move { health::api::run(&worker, source).await });
            }
            PageMessage::ImagesRuntimeCacheStatus => {
                tokio::spawn(async move { health::images::run(&worker, source).await });
            }
        }
    }
}
