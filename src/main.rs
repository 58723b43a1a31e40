//! API gateway binary.
//!
//! ```text
//!     Client ──▶ http server ──▶ rate limit ──▶ dispatcher ──▶ circuit breaker
//!                                                                  │
//!                                                                  ▼
//!     Client ◀── gateway headers ◀──────────── service broker (retries) ──▶ upstream
//! ```
//!
//! Configuration comes from the TOML file named by `GATEWAY_CONFIG` (defaults
//! when unset) plus environment overrides.

use tokio::net::TcpListener;

use api_gateway::config;
use api_gateway::lifecycle::{shutdown_signal, Shutdown};
use api_gateway::observability::{logging, metrics};
use api_gateway::HttpServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_from_env()?;
    logging::init_logging(&config.observability);

    tracing::info!("api-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        rate_limit = config.rate_limit.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<std::net::SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                error = %e,
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let wait = shutdown.wait();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, wait).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
