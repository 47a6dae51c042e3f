//! Error types for the Tollgate service.

use thiserror::Error;

use crate::ratelimit::Strategy;

/// Main error type for Tollgate operations.
///
/// Note that a rejected request is not an error: it is reported as
/// [`RateLimitResult::Denied`](crate::ratelimit::RateLimitResult::Denied).
#[derive(Error, Debug)]
pub enum TollgateError {
    /// Configuration loading or parsing errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A BUSINESS bucket was requested for a plan that is not configured
    #[error("Unknown pricing plan '{plan}'; valid plans are: [{}]", .valid.join(", "))]
    UnknownPlan { plan: String, valid: Vec<String> },

    /// A strategy resolved to a bucket with no bandwidth limits
    #[error("No bandwidth limits configured for the {0} strategy")]
    EmptyBucketSpec(Strategy),

    /// A bandwidth limit violates its invariants
    #[error("Invalid bandwidth limit '{name}': {reason}")]
    InvalidBandwidth { name: String, reason: String },

    /// An audit event could not be constructed
    #[error("Invalid rate limit event: {0}")]
    InvalidEvent(String),

    /// An event sink failed to accept an event
    #[error("Event sink error: {0}")]
    EventSink(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TollgateError {
    /// Whether this error is a configuration defect rather than a runtime condition.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TollgateError::Config(_)
                | TollgateError::UnknownPlan { .. }
                | TollgateError::EmptyBucketSpec(_)
                | TollgateError::InvalidBandwidth { .. }
        )
    }
}

/// Result type alias for Tollgate operations.
pub type Result<T> = std::result::Result<T, TollgateError>;
