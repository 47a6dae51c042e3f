//! Rate limiting logic and state management.

mod bandwidth;
mod bucket;
mod builder;
mod key;
mod limiter;
pub mod plan;
mod result;
mod strategy;

pub use bandwidth::{BandwidthLimit, BucketSpec, TimeUnit};
pub use bucket::TokenBucket;
pub use builder::BucketSpecBuilder;
pub use key::BucketKey;
pub use limiter::RateLimiter;
pub use plan::resolve_plan;
pub use result::RateLimitResult;
pub use strategy::Strategy;
