//! Cognito auth host service.
//!
//! Serves a small API protected by the Cognito bearer token middleware.

use cognito_auth::config::Config;
use cognito_auth::middleware::auth::Authenticator;
use cognito_auth::observability::metrics::init_metrics_recorder;
use cognito_auth::routes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Cognito auth service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        jwks_url = %config.jwks_url,
        bind_address = %config.bind_address,
        algorithm = ?config.jwt_algorithm,
        issuer_enforced = config.issuer.is_some(),
        audience_enforced = config.audience.is_some(),
        jwt_clock_skew_seconds = config.jwt_clock_skew.as_secs(),
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        e
    })?;

    let authenticator = Arc::new(Authenticator::from_config(&config));

    let app = routes::build_routes(authenticator, Some(metrics_handle));

    // Parse bind address
    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Cognito auth service listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Cognito auth service shutdown complete");

    Ok(())
}

/// Install the tracing subscriber; `LOG_FORMAT=json` selects JSON output.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cognito=debug,common=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    let drain_secs: u64 = std::env::var("DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    }
}
