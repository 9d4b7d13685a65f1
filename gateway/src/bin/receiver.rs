//! VIRTA sink receiver
//!
//! Accepts inbound events over HTTP and appends them to the configured
//! Redis Stream.
//!
//! ## Usage
//!
//! ```bash
//! VIRTA_ADDRESS=redis://localhost:6379 \
//! VIRTA_STREAM=orders \
//! cargo run --bin virta-receiver
//! ```
//!
//! ## Environment Variables
//!
//! - `VIRTA_ADDRESS`: stream server URL (required)
//! - `VIRTA_STREAM`: stream key (required)
//! - `VIRTA_RECEIVER_ADDR`: listen address (default: "0.0.0.0:8080")
//! - `VIRTA_TLS_CA`: optional CA bundle for rediss:// addresses
//! - `VIRTA_LOG_LEVEL` / `VIRTA_LOG_FORMAT`: logging (default: "info" / "pretty")

use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use virta_gateway::config::{Config, LogFormat};
use virta_gateway::error::EngineError;
use virta_gateway::receiver;
use virta_gateway::store::{RedisPool, StreamPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config);

    info!(
        address = %config.address,
        stream = %config.stream,
        listen = %config.receiver_addr,
        "Starting VIRTA receiver"
    );

    let pool = RedisPool::new(&config)?;
    let store = pool.connect().await.map_err(EngineError::Startup)?;

    let app = receiver::router(store);
    let listener = tokio::net::TcpListener::bind(config.receiver_addr).await?;

    info!(listen = %config.receiver_addr, "Receiver listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("VIRTA receiver shutdown complete");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_level.clone().into());
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
