//! Process-wide request budgets consulted before every external call.

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[async_trait]
pub trait RateBudget: Send + Sync {
    /// Take one permit without waiting.
    fn try_acquire(&self) -> bool;

    /// Wait for a permit. Returns false when the budget can never replenish.
    async fn acquire(&self) -> bool;
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket holding `requests_per_interval` permits, refilled evenly
/// over `interval`.
pub struct GovernorBudget {
    limiter: DirectLimiter,
}

impl GovernorBudget {
    pub fn new(requests_per_interval: NonZeroU32, interval: Duration) -> Self {
        let period = interval / requests_per_interval.get();
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(requests_per_interval))
            .allow_burst(requests_per_interval);

        Self {
            limiter: RateLimiter::direct(quota),
        }
    }
}

#[async_trait]
impl RateBudget for GovernorBudget {
    fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    async fn acquire(&self) -> bool {
        self.limiter.until_ready().await;
        true
    }
}

/// A fixed number of permits that is never replenished.
pub struct FixedBudget {
    remaining: AtomicU64,
}

impl FixedBudget {
    pub fn new(permits: u64) -> Self {
        Self {
            remaining: AtomicU64::new(permits),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(u64::MAX)
    }

    pub fn exhausted() -> Self {
        Self::new(0)
    }

    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateBudget for FixedBudget {
    fn try_acquire(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    async fn acquire(&self) -> bool {
        self.try_acquire()
    }
}
