//! Token bucket implementation.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::bandwidth::{BandwidthLimit, BucketSpec};
use super::result::RateLimitResult;

/// Refill state for one bandwidth limit.
///
/// Refill is greedy: elapsed time is converted into tokens continuously. The
/// fractional part that does not yet add up to a whole token is carried in
/// `remainder`, measured in token-nanoseconds (`elapsed_nanos * refill_tokens`).
#[derive(Debug)]
struct BandwidthState {
    capacity: u64,
    refill_tokens: u128,
    period_nanos: u128,
    available: u64,
    remainder: u128,
    last_refill: Instant,
}

impl BandwidthState {
    fn new(limit: &BandwidthLimit, now: Instant) -> Self {
        Self {
            capacity: limit.capacity,
            refill_tokens: u128::from(limit.refill_tokens),
            period_nanos: limit.refill_duration().as_nanos().max(1),
            available: limit.initial_tokens(),
            remainder: 0,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        // Instants earlier than the last refill add nothing.
        if now <= self.last_refill {
            return;
        }
        let elapsed = now.duration_since(self.last_refill).as_nanos();
        self.last_refill = now;

        if self.available >= self.capacity {
            self.remainder = 0;
            return;
        }

        let accrued = elapsed.saturating_mul(self.refill_tokens).saturating_add(self.remainder);
        let tokens = accrued / self.period_nanos;
        self.remainder = accrued % self.period_nanos;

        let missing = u128::from(self.capacity - self.available);
        if tokens >= missing {
            self.available = self.capacity;
            self.remainder = 0;
        } else {
            self.available += tokens as u64;
        }
    }

    /// Time until one more token accrues, assuming no tokens are available.
    fn time_to_next_token(&self) -> Duration {
        let outstanding = self.period_nanos.saturating_sub(self.remainder);
        let nanos = outstanding.div_ceil(self.refill_tokens);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    fn is_full(&self) -> bool {
        self.available >= self.capacity
    }
}

#[derive(Debug)]
struct BucketState {
    bandwidths: Vec<BandwidthState>,
    last_access: Instant,
}

/// A thread-safe token bucket bound to one [`BucketSpec`].
///
/// All stacked bandwidths are refilled and checked under a single lock, so a
/// consumption either takes one token from every bandwidth or from none.
#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a bucket whose refill clock starts now.
    pub fn new(spec: &BucketSpec) -> Self {
        Self::new_at(spec, Instant::now())
    }

    /// Create a bucket whose refill clock starts at `now`.
    pub fn new_at(spec: &BucketSpec, now: Instant) -> Self {
        let bandwidths = spec
            .bandwidths()
            .iter()
            .map(|limit| BandwidthState::new(limit, now))
            .collect();

        Self {
            state: Mutex::new(BucketState {
                bandwidths,
                last_access: now,
            }),
        }
    }

    /// Try to consume one token.
    pub fn try_consume(&self) -> RateLimitResult {
        self.try_consume_at(Instant::now())
    }

    /// Try to consume one token at the given instant.
    pub fn try_consume_at(&self, now: Instant) -> RateLimitResult {
        let mut state = self.state.lock();
        state.last_access = now;

        for bandwidth in state.bandwidths.iter_mut() {
            bandwidth.refill(now);
        }

        let retry_after = state
            .bandwidths
            .iter()
            .filter(|b| b.available == 0)
            .map(BandwidthState::time_to_next_token)
            .max();

        if let Some(retry_after) = retry_after {
            return RateLimitResult::Denied { retry_after };
        }

        let mut remaining_tokens = u64::MAX;
        for bandwidth in state.bandwidths.iter_mut() {
            bandwidth.available -= 1;
            remaining_tokens = remaining_tokens.min(bandwidth.available);
        }

        RateLimitResult::Allowed { remaining_tokens }
    }

    /// Tokens currently available, without consuming.
    pub fn available_tokens_at(&self, now: Instant) -> u64 {
        let mut state = self.state.lock();
        state
            .bandwidths
            .iter_mut()
            .map(|b| {
                b.refill(now);
                b.available
            })
            .min()
            .unwrap_or(0)
    }

    pub fn available_tokens(&self) -> u64 {
        self.available_tokens_at(Instant::now())
    }

    /// Whether the bucket has not been used for `idle_ttl` and is fully
    /// replenished, i.e. indistinguishable from a fresh bucket.
    pub fn is_idle_at(&self, now: Instant, idle_ttl: Duration) -> bool {
        let mut state = self.state.lock();
        if now.saturating_duration_since(state.last_access) < idle_ttl {
            return false;
        }
        state.bandwidths.iter_mut().all(|b| {
            b.refill(now);
            b.is_full()
        })
    }
}
