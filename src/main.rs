use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tollgate::config::TollgateConfig;
use tollgate::event::TracingEventSink;
use tollgate::http::HttpServer;
use tollgate::ratelimit::{BucketSpecBuilder, RateLimiter};
use tollgate::service::RateLimitService;

/// Token-bucket admission control for authentication and API endpoints.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }

    info!("Starting Tollgate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => TollgateConfig::from_file(path)?,
        None => TollgateConfig::default(),
    };
    info!(
        http_addr = %config.server.http_addr,
        enabled = config.rate_limit.enabled,
        "Configuration loaded"
    );

    // Build every bucket spec up front so configuration defects fail startup.
    let builder = BucketSpecBuilder::new(Arc::new(config.rate_limit.clone()));
    builder.verify()?;
    info!(
        auth_enabled = builder.is_auth_enabled(),
        business_enabled = builder.is_business_enabled(),
        plans = ?builder.plan_names(),
        "Rate limits validated"
    );

    let limiter = Arc::new(RateLimiter::new(builder));
    let sweeper = limiter.spawn_sweeper();
    let service = RateLimitService::new(limiter, Arc::new(TracingEventSink));

    let server = HttpServer::new(config.server.http_addr, service);
    server.serve_with_shutdown(shutdown_signal()).await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    info!("Tollgate stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
