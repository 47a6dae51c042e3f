//! HTTP server implementation.

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::filter::{auth_rate_limit, business_rate_limit};
use crate::error::Result;
use crate::service::RateLimitService;

/// Build the demo application with both rate limiting stages installed.
///
/// The AUTH stage runs first; requests it charges are skipped by the
/// BUSINESS stage.
pub fn router(service: RateLimitService) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/v1/status", get(status))
        .layer(middleware::from_fn_with_state(
            service.clone(),
            business_rate_limit,
        ))
        .layer(middleware::from_fn_with_state(service, auth_rate_limit))
}

async fn login() -> Json<Value> {
    Json(json!({ "status": "authenticated" }))
}

async fn register() -> Json<Value> {
    Json(json!({ "status": "registered" }))
}

async fn status() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// HTTP server for the rate limited application.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    router: Router,
}

impl HttpServer {
    /// Create a new server serving the demo [`router`].
    pub fn new(addr: SocketAddr, service: RateLimitService) -> Self {
        Self::with_router(addr, router(service))
    }

    /// Create a new server around an existing router.
    pub fn with_router(addr: SocketAddr, router: Router) -> Self {
        Self { addr, router }
    }

    /// Start the server.
    ///
    /// This method will block until the server fails.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "Starting HTTP server");

        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            e.into()
        })
    }
}
