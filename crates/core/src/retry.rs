//! Bounded retry over async operations.
//!
//! One attempt plus one retry per delay in the schedule. Transient storage
//! and delivery failures across the worker all go through this helper, so
//! retry bounds live in the call sites' schedules rather than in scattered
//! loop logic.

use std::future::Future;
use std::time::Duration;

/// A fixed-delay schedule: `attempts` tries total, `delay` between them.
pub fn fixed(attempts: usize, delay: Duration) -> Vec<Duration> {
    vec![delay; attempts.saturating_sub(1)]
}

/// Run `op` until it succeeds or the schedule is exhausted.
///
/// `delays[i]` is slept after failed attempt `i`; the total number of
/// attempts is `delays.len() + 1`. The last error is returned when every
/// attempt fails.
pub async fn with_retry<T, E, F, Fut>(delays: &[Duration], mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut failed = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(_) if failed < delays.len() => {
                tracing::trace!(attempt = failed + 1, total = delays.len() + 1, "retrying after failure");
                tokio::time::sleep(delays[failed]).await;
                failed += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
