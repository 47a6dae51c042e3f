//! Bucket cache keys.

use std::fmt;

use super::strategy::Strategy;

/// Uniquely identifies one live bucket.
///
/// The identifier is opaque; `plan` is only set for BUSINESS buckets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub identifier: String,
    pub strategy: Strategy,
    pub plan: Option<&'static str>,
}

impl BucketKey {
    pub fn auth(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            strategy: Strategy::Auth,
            plan: None,
        }
    }

    pub fn business(identifier: &str, plan: &'static str) -> Self {
        Self {
            identifier: identifier.to_string(),
            strategy: Strategy::Business,
            plan: Some(plan),
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.plan {
            Some(plan) => write!(f, "{}:{}:{}", self.strategy, plan, self.identifier),
            None => write!(f, "{}:{}", self.strategy, self.identifier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        assert_eq!(BucketKey::auth("IP:1.2.3.4").to_string(), "AUTH:IP:1.2.3.4");
        assert_eq!(
            BucketKey::business("PX001-A", "professional").to_string(),
            "BUSINESS:professional:PX001-A"
        );
    }

    #[test]
    fn test_strategy_distinguishes_keys() {
        assert_ne!(BucketKey::auth("id"), BucketKey::business("id", "free"));
        assert_eq!(BucketKey::auth("id"), BucketKey::auth("id"));
    }
}
