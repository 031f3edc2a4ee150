//! # Auth Gateway - Main Entry Point
//!
//! Initializes tracing, loads configuration, and runs the gateway server
//! until a shutdown signal arrives.

use tracing::info;

use auth_gateway::{GatewayConfig, GatewayResult, GatewayServer};

#[tokio::main]
async fn main() -> GatewayResult<()> {
    init_observability();

    info!("starting auth gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = GatewayConfig::load().await?;
    config.validate()?;

    let server = GatewayServer::new(&config)?;
    info!(
        bind = %server.bind_addr(),
        upstream = %config.upstream.base_url,
        permits_per_window = config.rate_limiter.permits_per_window,
        failure_rate_threshold = config.circuit_breaker.failure_rate_threshold,
        "gateway configured"
    );

    server.run().await?;

    info!("auth gateway shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber with env-filter support
fn init_observability() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_gateway=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
