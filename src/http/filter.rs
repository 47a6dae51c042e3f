//! Rate limiting stages for the request pipeline.
//!
//! [`auth_rate_limit`] guards the configured authentication endpoints with the
//! AUTH strategy. [`business_rate_limit`] applies the BUSINESS strategy to
//! everything else it is layered on. Both mark the request with
//! [`RateLimitProcessed`] so a request is only ever charged once.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use super::identifier::{api_key, ip_identifier};
use crate::error::TollgateError;
use crate::ratelimit::{RateLimitResult, Strategy};
use crate::service::RateLimitService;

pub const REMAINING_HEADER: &str = "x-rate-limit-remaining";
pub const RETRY_AFTER_HEADER: &str = "x-rate-limit-retry-after-seconds";

/// Request extension set once a rate limiting stage has charged the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitProcessed;

/// JSON body returned with a 429 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitRejection {
    pub error: String,
    pub message: String,
    pub path: String,
    pub strategy: Strategy,
    pub retry_after_seconds: u64,
    pub retry_at: DateTime<Utc>,
}

/// Apply the AUTH strategy to requests for configured authentication endpoints.
pub async fn auth_rate_limit(
    State(service): State<RateLimitService>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.extensions().get::<RateLimitProcessed>().is_some() {
        return next.run(request).await;
    }

    let builder = service.limiter().builder();
    if !builder.is_auth_enabled() {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    if !matches_endpoint(&path, builder.auth_endpoints()) {
        return next.run(request).await;
    }

    let identifier = ip_identifier(&request);
    request.extensions_mut().insert(RateLimitProcessed);

    let result = service.consume_token(&identifier, &path, Strategy::Auth).await;
    apply_decision(result, &path, Strategy::Auth, request, next).await
}

/// Apply the BUSINESS strategy, keyed by the authenticated API key or,
/// failing that, the client IP.
///
/// Layer this inside whatever authenticates API keys; see
/// [`AuthenticatedApiKey`](super::identifier::AuthenticatedApiKey).
pub async fn business_rate_limit(
    State(service): State<RateLimitService>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.extensions().get::<RateLimitProcessed>().is_some()
        || !service.limiter().builder().is_business_enabled()
    {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    let identifier = api_key(&request).unwrap_or_else(|| ip_identifier(&request));
    request.extensions_mut().insert(RateLimitProcessed);

    let result = service.consume_token(&identifier, &path, Strategy::Business).await;
    apply_decision(result, &path, Strategy::Business, request, next).await
}

async fn apply_decision(
    result: crate::error::Result<RateLimitResult>,
    path: &str,
    strategy: Strategy,
    request: Request,
    next: Next,
) -> Response {
    match result {
        Ok(RateLimitResult::Allowed { remaining_tokens }) => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert(REMAINING_HEADER, HeaderValue::from(remaining_tokens));
            response
        }
        Ok(RateLimitResult::Denied { retry_after }) => {
            debug!(path = %path, strategy = %strategy, "Rejecting rate limited request");
            too_many_requests(path, strategy, retry_after)
        }
        Err(e) => configuration_failure(e),
    }
}

fn too_many_requests(path: &str, strategy: Strategy, retry_after: Duration) -> Response {
    let retry_after_seconds = whole_seconds(retry_after);
    let retry_at = chrono::Duration::from_std(retry_after)
        .ok()
        .and_then(|d| Utc::now().checked_add_signed(d))
        .unwrap_or_else(Utc::now);

    let body = RateLimitRejection {
        error: "Too Many Requests".to_string(),
        message: format!(
            "Rate limit exceeded. Please retry after {} seconds.",
            retry_after_seconds
        ),
        path: path.to_string(),
        strategy,
        retry_after_seconds,
        retry_at,
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(RETRY_AFTER_HEADER, HeaderValue::from(retry_after_seconds));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// A bucket could not be built. This is a deployment defect, so the request
/// is neither admitted nor reported as rate limited.
fn configuration_failure(e: TollgateError) -> Response {
    error!(error = %e, "Rate limiting is misconfigured");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "error": "Internal Server Error",
            "message": "rate limiting is misconfigured",
        })),
    )
        .into_response()
}

/// Round up so that a client waiting the advertised time finds a token.
fn whole_seconds(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// Strip the query string, fragment and trailing slashes from a path.
fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Whether `path` falls under one of the `endpoints` prefixes, on a path
/// segment boundary.
pub fn matches_endpoint(path: &str, endpoints: &[String]) -> bool {
    let path = normalize_path(path);
    endpoints.iter().any(|endpoint| {
        let endpoint = normalize_path(endpoint);
        endpoint == "/"
            || path == endpoint
            || path
                .strip_prefix(endpoint)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}
