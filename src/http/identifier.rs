//! Caller identification from inbound requests.

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use std::net::SocketAddr;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Address used when neither a forwarded header nor a peer address is known.
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// The client address: first `X-Forwarded-For` entry, else the peer address.
pub fn client_address(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| remote.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string())
}

/// `IP:<address>` identifier for a request.
pub fn ip_identifier<B>(request: &Request<B>) -> String {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    format!("IP:{}", client_address(request.headers(), remote))
}

/// An API key that an earlier stage has authenticated.
///
/// Authentication middleware inserts this as a request extension. The
/// BUSINESS stage never trusts a raw `X-API-Key` header: the key selects the
/// caller's plan, so an unverified one would let clients pick their own limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedApiKey(pub String);

/// The authenticated API key for a request, if any.
pub fn api_key<B>(request: &Request<B>) -> Option<String> {
    request
        .extensions()
        .get::<AuthenticatedApiKey>()
        .map(|AuthenticatedApiKey(key)| key.trim())
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "192.168.1.20:51234".parse().unwrap()
    }

    #[test]
    fn test_forwarded_for_takes_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));

        assert_eq!(client_address(&headers, Some(peer())), "203.0.113.7");
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        assert_eq!(client_address(&HeaderMap::new(), Some(peer())), "192.168.1.20");

        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static(""));
        assert_eq!(client_address(&headers, Some(peer())), "192.168.1.20");
    }

    #[test]
    fn test_unknown_without_any_source() {
        assert_eq!(client_address(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn test_ip_identifier_uses_connect_info() {
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(ip_identifier(&request), "IP:unknown");

        request.extensions_mut().insert(ConnectInfo(peer()));
        assert_eq!(ip_identifier(&request), "IP:192.168.1.20");
    }

    #[test]
    fn test_api_key_requires_authentication() {
        let mut request = Request::builder()
            .uri("/")
            .header("x-api-key", "PX001-ABC123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(api_key(&request), None);

        request
            .extensions_mut()
            .insert(AuthenticatedApiKey("BX001-XYZ".to_string()));
        assert_eq!(api_key(&request).as_deref(), Some("BX001-XYZ"));
    }
}
