//! The cacheshell worker.
//!
//! Hosts the offline cache orchestration layer: lifecycle
//! (install/activate), the tier router and strategies invoked per
//! intercepted fetch, the fallback resolver, health status reporting, the
//! cache reset coordinator, and the client message bridge. The embedding
//! runtime drives it through two entry points: [`CacheWorker::handle_fetch`]
//! for intercepted requests and [`CacheWorker::dispatch`] for page
//! messages.

pub mod bridge;
mod fallback;
mod health;
pub mod lifecycle;
mod precache;
mod reset;
pub mod router;
mod strategy;
mod sweep;
#[cfg(test)]
mod testing;
pub mod worker;

pub use bridge::{ClientBridge, ClientId};
pub use lifecycle::WorkerState;
pub use router::{Destination, RequestContext, Route};
pub use worker::CacheWorker;
