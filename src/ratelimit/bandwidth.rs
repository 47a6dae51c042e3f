//! Bandwidth limits and bucket specifications.
//!
//! A [`BandwidthLimit`] is one replenishment rule. A [`BucketSpec`] stacks one
//! or more of them; a consumption succeeds only if every limit in the spec
//! permits it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::strategy::Strategy;
use crate::error::{Result, TollgateError};

/// Time unit for refill periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    /// Get the duration of one unit.
    pub fn duration(&self) -> Duration {
        match self {
            TimeUnit::Second => Duration::from_secs(1),
            TimeUnit::Minute => Duration::from_secs(60),
            TimeUnit::Hour => Duration::from_secs(3600),
            TimeUnit::Day => Duration::from_secs(86400),
        }
    }
}

/// One replenishment rule: `refill_tokens` are added back every
/// `refill_period` units, up to `capacity`.
///
/// Tokens become available greedily, at a steady rate of
/// `refill_tokens / refill_duration()`, rather than in one burst at the end
/// of each period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthLimit {
    /// Informational label
    #[serde(default)]
    pub name: String,
    /// Maximum number of tokens the bucket can hold
    pub capacity: u64,
    /// Tokens restored per refill period
    pub refill_tokens: u64,
    /// Number of `refill_unit`s in one refill period
    #[serde(default = "default_refill_period")]
    pub refill_period: u64,
    /// Unit of the refill period
    pub refill_unit: TimeUnit,
    /// Starting token count; defaults to `capacity`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_tokens: Option<u64>,
}

fn default_refill_period() -> u64 {
    1
}

impl BandwidthLimit {
    /// A limit that refills its full capacity once per `unit`.
    pub fn per(name: impl Into<String>, capacity: u64, unit: TimeUnit) -> Self {
        Self {
            name: name.into(),
            capacity,
            refill_tokens: capacity,
            refill_period: 1,
            refill_unit: unit,
            initial_tokens: None,
        }
    }

    /// Override the starting token count.
    pub fn with_initial_tokens(mut self, initial_tokens: u64) -> Self {
        self.initial_tokens = Some(initial_tokens);
        self
    }

    /// Override the refill rate.
    pub fn with_refill(mut self, refill_tokens: u64, refill_period: u64, unit: TimeUnit) -> Self {
        self.refill_tokens = refill_tokens;
        self.refill_period = refill_period;
        self.refill_unit = unit;
        self
    }

    /// Time over which `refill_tokens` are restored.
    pub fn refill_duration(&self) -> Duration {
        self.refill_unit
            .duration()
            .saturating_mul(u32::try_from(self.refill_period).unwrap_or(u32::MAX))
    }

    /// Number of tokens a freshly created bucket starts with.
    pub fn initial_tokens(&self) -> u64 {
        self.initial_tokens.unwrap_or(self.capacity)
    }

    /// Check the invariants of this limit.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| TollgateError::InvalidBandwidth {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.capacity == 0 {
            return Err(invalid("capacity must be greater than zero"));
        }
        if self.refill_tokens == 0 {
            return Err(invalid("refill_tokens must be greater than zero"));
        }
        if self.refill_period == 0 {
            return Err(invalid("refill_period must be greater than zero"));
        }
        if self.initial_tokens() > self.capacity {
            return Err(invalid("initial_tokens must not exceed capacity"));
        }
        Ok(())
    }
}

/// An ordered, non-empty list of bandwidth limits backing one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSpec {
    bandwidths: Vec<BandwidthLimit>,
}

impl BucketSpec {
    /// Build a spec for `strategy`, failing if `bandwidths` is empty or any
    /// limit is invalid.
    pub fn new(strategy: Strategy, bandwidths: Vec<BandwidthLimit>) -> Result<Self> {
        if bandwidths.is_empty() {
            return Err(TollgateError::EmptyBucketSpec(strategy));
        }
        for bandwidth in &bandwidths {
            bandwidth.validate()?;
        }
        Ok(Self { bandwidths })
    }

    /// The limits in configuration order.
    pub fn bandwidths(&self) -> &[BandwidthLimit] {
        &self.bandwidths
    }

    /// The smallest capacity across all stacked limits.
    pub fn capacity(&self) -> u64 {
        self.bandwidths
            .iter()
            .map(|b| b.capacity)
            .min()
            .unwrap_or_default()
    }
}
