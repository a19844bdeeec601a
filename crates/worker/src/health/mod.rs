//! Poll-until-converged cache health reporting.
//!
//! A health request gets an immediate status, then repeated re-checks on a
//! fixed interval until the tracked resource set converges or a hard
//! wall-clock deadline passes, at which point one final status is delivered
//! and polling stops unconditionally. Each request owns its own
//! [`PollContext`]; nothing about an in-flight check is shared across
//! events.

pub(crate) mod api;
pub(crate) mod images;
pub(crate) mod precache;

use std::time::Duration;

use cacheshell_core::WorkerMessage;
use tokio::time::Instant;

use crate::bridge::ClientId;
use crate::worker::CacheWorker;

/// Per-request polling state: when it started, how often to re-check, when
/// to give up, and who asked.
pub(crate) struct PollContext {
    started: Instant,
    interval: Duration,
    deadline: Duration,
    source: Option<ClientId>,
}

impl PollContext {
    pub(crate) fn new(worker: &CacheWorker, source: Option<ClientId>) -> Self {
        Self {
            started: Instant::now(),
            interval: worker.config.poll_interval(),
            deadline: worker.config.poll_deadline(),
            source,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// One resource set's convergence check and message wording.
pub(crate) trait StatusProbe {
    type Status;

    async fn check(&self) -> Self::Status;
    fn converged(&self, status: &Self::Status) -> bool;
    fn build(&self, status: &Self::Status, elapsed: Duration, is_final: bool) -> WorkerMessage;
}

/// Drive one probe to convergence or deadline, delivering every status.
pub(crate) async fn run_poll<P: StatusProbe>(worker: &CacheWorker, ctx: PollContext, probe: P) {
    loop {
        let elapsed = ctx.elapsed();
        let is_final = elapsed >= ctx.deadline;

        let status = probe.check().await;
        let message = probe.build(&status, elapsed, is_final);
        worker.bridge.deliver(ctx.source, message).await;

        if is_final || probe.converged(&status) {
            break;
        }
        tokio::time::sleep(ctx.interval).await;
    }
}
