//! HTTP integration: identifier extraction, rate limiting middleware and a
//! small demo server.

mod filter;
pub mod identifier;
mod server;

pub use filter::{
    auth_rate_limit, business_rate_limit, matches_endpoint, RateLimitProcessed,
    RateLimitRejection, REMAINING_HEADER, RETRY_AFTER_HEADER,
};
pub use identifier::AuthenticatedApiKey;
pub use server::{router, HttpServer};
