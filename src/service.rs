//! Rate limiting orchestration service.
//!
//! Couples the limiter with auditing: every denial is published to the
//! configured [`EventSink`] before the result is handed back to the caller.

use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

use crate::error::Result;
use crate::event::{EventSink, RateLimitExceededEvent};
use crate::ratelimit::{RateLimitResult, RateLimiter, Strategy};

/// Longest a denial waits on the event sink before the event is dropped.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_millis(250);

/// Single entry point used by the request pipeline.
#[derive(Clone)]
pub struct RateLimitService {
    limiter: Arc<RateLimiter>,
    sink: Arc<dyn EventSink>,
}

impl RateLimitService {
    pub fn new(limiter: Arc<RateLimiter>, sink: Arc<dyn EventSink>) -> Self {
        Self { limiter, sink }
    }

    /// Consume one BUSINESS token for `identifier` on `endpoint`.
    pub async fn consume_business_token(&self, identifier: &str, endpoint: &str) -> Result<RateLimitResult> {
        self.consume_token(identifier, endpoint, Strategy::Business).await
    }

    /// Consume one token for `identifier` on `endpoint` under `strategy`.
    ///
    /// Configuration errors from the limiter are returned unchanged. Event
    /// sink failures and timeouts are logged and do not affect the result.
    #[instrument(skip(self, strategy), fields(strategy = %strategy))]
    pub async fn consume_token(
        &self,
        identifier: &str,
        endpoint: &str,
        strategy: Strategy,
    ) -> Result<RateLimitResult> {
        let result = self.limiter.consume_with(identifier, strategy)?;

        if let RateLimitResult::Denied { retry_after } = result {
            match RateLimitExceededEvent::new(identifier, endpoint, strategy, retry_after) {
                Ok(event) => match tokio::time::timeout(PUBLISH_TIMEOUT, self.sink.publish(event)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(error = %e, "Failed to publish rate limit event"),
                    Err(_) => warn!(
                        timeout_ms = PUBLISH_TIMEOUT.as_millis() as u64,
                        "Rate limit event sink timed out; event dropped"
                    ),
                },
                Err(e) => warn!(error = %e, "Skipping rate limit event"),
            }
        }

        Ok(result)
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}
