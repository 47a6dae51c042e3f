//! Core rate limiter implementation.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::bucket::TokenBucket;
use super::builder::BucketSpecBuilder;
use super::key::BucketKey;
use super::plan::{resolve_plan, FREE_PLAN};
use super::result::RateLimitResult;
use super::strategy::Strategy;
use crate::error::{Result, TollgateError};

/// The token-bucket rate limiter.
///
/// Buckets are created lazily, once per [`BucketKey`], and live in a sharded
/// concurrent map: creating a bucket for one key never blocks consumers of
/// unrelated keys, and consumption only locks the bucket being used.
pub struct RateLimiter {
    builder: BucketSpecBuilder,
    buckets: DashMap<BucketKey, TokenBucket>,
}

impl RateLimiter {
    pub fn new(builder: BucketSpecBuilder) -> Self {
        Self {
            builder,
            buckets: DashMap::new(),
        }
    }

    /// Consume one BUSINESS token for `identifier`.
    pub fn consume(&self, identifier: &str) -> Result<RateLimitResult> {
        self.consume_with(identifier, Strategy::Business)
    }

    /// Consume one token for `identifier` under `strategy`.
    ///
    /// Fails only when the bucket cannot be built from configuration.
    pub fn consume_with(&self, identifier: &str, strategy: Strategy) -> Result<RateLimitResult> {
        self.consume_at(identifier, strategy, Instant::now())
    }

    /// Consume one token at the given instant.
    pub fn consume_at(
        &self,
        identifier: &str,
        strategy: Strategy,
        now: Instant,
    ) -> Result<RateLimitResult> {
        let key = match strategy {
            Strategy::Auth => BucketKey::auth(identifier),
            Strategy::Business => BucketKey::business(identifier, resolve_plan(identifier)),
        };

        let result = self.with_bucket(&key, now, |bucket| bucket.try_consume_at(now))?;

        trace!(key = %key, result = ?result, "Consumed token");
        if let RateLimitResult::Denied { retry_after } = result {
            debug!(
                key = %key,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
        }

        Ok(result)
    }

    /// Run `f` against the bucket for `key`, building it on first use.
    ///
    /// `f` runs while the map guard is held. Eviction takes the shard write
    /// lock, so a bucket can never be removed between lookup and use.
    fn with_bucket<T>(
        &self,
        key: &BucketKey,
        now: Instant,
        f: impl FnOnce(&TokenBucket) -> T,
    ) -> Result<T> {
        if let Some(bucket) = self.buckets.get(key) {
            return Ok(f(bucket.value()));
        }

        // The entry holds the shard lock, so concurrent misses on the same
        // key build exactly one bucket.
        let entry = self.buckets.entry(key.clone()).or_try_insert_with(|| {
            let spec = match key.strategy {
                Strategy::Auth => self.builder.build_auth_spec()?,
                Strategy::Business => self
                    .builder
                    .build_business_spec(key.plan.unwrap_or(FREE_PLAN))?,
            };
            debug!(
                key = %key,
                capacity = spec.capacity(),
                bandwidths = spec.bandwidths().len(),
                "Creating new token bucket"
            );
            Ok::<_, TollgateError>(TokenBucket::new_at(&spec, now))
        })?;

        Ok(f(entry.value()))
    }

    /// Remove buckets that have been idle for at least `idle_ttl` and are
    /// fully replenished. Returns the number of buckets evicted.
    pub fn evict_idle(&self, idle_ttl: Duration) -> usize {
        self.evict_idle_at(Instant::now(), idle_ttl)
    }

    pub fn evict_idle_at(&self, now: Instant, idle_ttl: Duration) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| !bucket.is_idle_at(now, idle_ttl));
        let evicted = before.saturating_sub(self.buckets.len());

        if evicted > 0 {
            debug!(evicted, remaining = self.buckets.len(), "Evicted idle buckets");
        }
        evicted
    }

    /// Periodically evict idle buckets according to the cache configuration.
    ///
    /// Returns `None` when eviction is disabled.
    pub fn spawn_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let cache = &self.builder.properties().cache;
        let idle_ttl = cache.idle_ttl()?;
        let period = cache.sweep_interval();
        let limiter = Arc::clone(self);

        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                limiter.evict_idle(idle_ttl);
            }
        }))
    }

    /// Tokens currently available to `identifier`, if its bucket exists.
    pub fn available_tokens(&self, identifier: &str, strategy: Strategy) -> Option<u64> {
        let key = match strategy {
            Strategy::Auth => BucketKey::auth(identifier),
            Strategy::Business => BucketKey::business(identifier, resolve_plan(identifier)),
        };
        self.buckets.get(&key).map(|b| b.available_tokens())
    }

    pub fn builder(&self) -> &BucketSpecBuilder {
        &self.builder
    }

    /// Get the number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Drop every bucket.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.buckets.clear();
    }
}
