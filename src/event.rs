//! Audit events emitted when a caller is rate limited.
//!
//! The orchestration service builds one [`RateLimitExceededEvent`] per denial
//! and hands it to an [`EventSink`]. Sinks are best-effort: a failing sink is
//! logged and never changes the admission decision.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Result, TollgateError};
use crate::ratelimit::Strategy;

/// Immutable record of one rejected request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitExceededEvent {
    id: Uuid,
    identifier: String,
    endpoint: String,
    strategy: Strategy,
    window_duration: Duration,
    timestamp: DateTime<Utc>,
    reset_time: Option<DateTime<Utc>>,
    attempt_count: Option<u32>,
    max_attempts: Option<u32>,
}

impl RateLimitExceededEvent {
    /// Create an event stamped with the current time.
    ///
    /// `window_duration` is the retry-after duration returned to the caller.
    pub fn new(
        identifier: impl Into<String>,
        endpoint: impl Into<String>,
        strategy: Strategy,
        window_duration: Duration,
    ) -> Result<Self> {
        let identifier = identifier.into();
        let endpoint = endpoint.into();

        if identifier.trim().is_empty() {
            return Err(TollgateError::InvalidEvent("identifier must not be blank".to_string()));
        }
        if endpoint.trim().is_empty() {
            return Err(TollgateError::InvalidEvent("endpoint must not be blank".to_string()));
        }

        let timestamp = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            identifier,
            endpoint,
            strategy,
            window_duration,
            timestamp,
            reset_time: None,
            attempt_count: None,
            max_attempts: None,
        }
        .with_timestamp(timestamp))
    }

    /// Override the creation time; the reset time follows it.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self.reset_time = chrono::Duration::from_std(self.window_duration)
            .ok()
            .and_then(|window| timestamp.checked_add_signed(window));
        self
    }

    /// Record how many attempts were made against how many were permitted.
    pub fn with_attempts(mut self, attempt_count: u32, max_attempts: u32) -> Result<Self> {
        if max_attempts == 0 {
            return Err(TollgateError::InvalidEvent("max_attempts must be at least 1".to_string()));
        }
        if attempt_count < max_attempts {
            return Err(TollgateError::InvalidEvent(format!(
                "attempt_count ({}) must be at least max_attempts ({})",
                attempt_count, max_attempts
            )));
        }
        self.attempt_count = Some(attempt_count);
        self.max_attempts = Some(max_attempts);
        Ok(self)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn window_duration(&self) -> Duration {
        self.window_duration
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn reset_time(&self) -> Option<DateTime<Utc>> {
        self.reset_time
    }

    pub fn attempt_count(&self) -> Option<u32> {
        self.attempt_count
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}

/// Destination for rate limit audit events.
///
/// Publishing happens on the request path, before the denial is returned.
/// Implementations should hand the event off (a channel, a log line) rather
/// than wait on remote I/O; the service abandons a publish that takes longer
/// than [`PUBLISH_TIMEOUT`](crate::service::PUBLISH_TIMEOUT).
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publish one event.
    async fn publish(&self, event: RateLimitExceededEvent) -> Result<()>;
}

/// Writes every event to the `tracing` log.
#[derive(Debug, Clone, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn publish(&self, event: RateLimitExceededEvent) -> Result<()> {
        warn!(
            event_id = %event.id,
            identifier = %event.identifier,
            endpoint = %event.endpoint,
            strategy = %event.strategy,
            window_ms = event.window_duration.as_millis() as u64,
            reset_time = ?event.reset_time,
            "Rate limit exceeded"
        );
        Ok(())
    }
}

/// Forwards events to a bounded channel for an external consumer.
///
/// Publishing never waits: a full or closed channel is reported as an error.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::Sender<RateLimitExceededEvent>,
}

impl ChannelEventSink {
    /// Create a sink and the receiving half of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RateLimitExceededEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn publish(&self, event: RateLimitExceededEvent) -> Result<()> {
        self.sender.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                TollgateError::EventSink("event channel is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                TollgateError::EventSink("event channel is closed".to_string())
            }
        })
    }
}
