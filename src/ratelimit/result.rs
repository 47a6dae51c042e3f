//! Outcome of a consumption attempt.

use serde::Serialize;
use std::time::Duration;

/// Result of trying to consume one token.
///
/// A denial is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RateLimitResult {
    /// The token was consumed; `remaining_tokens` is the post-decrement count.
    Allowed { remaining_tokens: u64 },
    /// No token was available; retry after at least `retry_after`.
    Denied { retry_after: Duration },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    pub fn is_denied(&self) -> bool {
        !self.is_allowed()
    }

    pub fn remaining_tokens(&self) -> Option<u64> {
        match self {
            RateLimitResult::Allowed { remaining_tokens } => Some(*remaining_tokens),
            RateLimitResult::Denied { .. } => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RateLimitResult::Allowed { .. } => None,
            RateLimitResult::Denied { retry_after } => Some(*retry_after),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let allowed = RateLimitResult::Allowed { remaining_tokens: 4 };
        assert!(allowed.is_allowed());
        assert_eq!(allowed.remaining_tokens(), Some(4));
        assert_eq!(allowed.retry_after(), None);

        let denied = RateLimitResult::Denied {
            retry_after: Duration::from_secs(12),
        };
        assert!(denied.is_denied());
        assert_eq!(denied.remaining_tokens(), None);
        assert_eq!(denied.retry_after(), Some(Duration::from_secs(12)));
    }
}
