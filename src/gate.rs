use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Shared admission gate for one upstream service: a concurrency ceiling
/// (semaphore) combined with a token-bucket submission limiter.
///
/// Per-call retry lives outside the gate, so a retried call re-enters the
/// queue and competes fairly for slots with fresh work.
pub struct RateGate {
    semaphore: Arc<Semaphore>,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

/// Held for the duration of one upstream call; dropping it frees the slot.
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl RateGate {
    pub fn new(max_concurrency: usize, per_second: u32) -> Self {
        let rps = NonZeroU32::new(per_second.max(1)).unwrap_or(NonZeroU32::MIN);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            limiter: RateLimiter::direct(Quota::per_second(rps)),
        }
    }

    pub async fn acquire(&self) -> GatePermit {
        // The semaphore is never closed, so acquisition can only pend.
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => unreachable!("gate semaphore is never closed"),
        };
        self.limiter.until_ready().await;
        debug!("rate gate permit acquired");
        GatePermit { _permit: permit }
    }
}
