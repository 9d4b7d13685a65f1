//! VIRTA source engine
//!
//! Consumes a Redis Stream through a consumer group and forwards each entry
//! as an event to the configured HTTP destination.
//!
//! ## Usage
//!
//! ```bash
//! VIRTA_ADDRESS=redis://localhost:6379 \
//! VIRTA_STREAM=orders \
//! VIRTA_TARGET=http://broker.example.com/events \
//! cargo run --bin virta
//! ```
//!
//! ## Environment Variables
//!
//! - `VIRTA_ADDRESS`: stream server URL (required)
//! - `VIRTA_STREAM`: stream key (required)
//! - `VIRTA_TARGET`: event destination URL, or "stdout" to print events (required)
//! - `VIRTA_GROUP`: consumer group name (default: "virta")
//! - `VIRTA_NAME`: instance identity used in consumer names (default: "virta")
//! - `VIRTA_CONSUMERS`: number of consumer workers (default: 1)
//! - `VIRTA_BLOCK_MS`: read block timeout (default: 5000)
//! - `VIRTA_RETRY_BACKOFF_MS`: backoff after failures (default: 1000)
//! - `VIRTA_TLS_CA`: optional CA bundle for rediss:// addresses
//! - `VIRTA_LOG_LEVEL` / `VIRTA_LOG_FORMAT`: logging (default: "info" / "pretty")

use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use virta_gateway::config::{Config, LogFormat};
use virta_gateway::deliver::{
    BackoffConfig, DeliveryGateway, HttpGateway, RetryGateway, StdoutGateway,
};
use virta_gateway::engine::{Engine, EngineConfig};
use virta_gateway::store::RedisPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Startup validation failures exit non-zero before any worker spawns.
    let config = Config::from_env()?;
    init_tracing(&config);

    info!(
        address = %config.address,
        stream = %config.stream,
        group = %config.group,
        consumers = config.consumers,
        "Starting VIRTA source engine"
    );

    let target = config.require_target()?.to_string();
    let pool = RedisPool::new(&config)?;
    let gateway: Arc<dyn DeliveryGateway> = match target.as_str() {
        // Debugging destination: print events instead of delivering them.
        "stdout" => Arc::new(StdoutGateway::pretty()),
        url => Arc::new(RetryGateway::wrap(
            HttpGateway::new(url)?,
            BackoffConfig::default(),
        )),
    };

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let engine = Engine::new(pool, gateway, EngineConfig::from_config(&config));
    engine.run(shutdown).await?;

    info!("VIRTA source engine shutdown complete");
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

async fn shutdown_signal(shutdown: CancellationToken) {
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
        _ = ctrl_c => info!("Received Ctrl+C, draining consumers"),
        _ = terminate => info!("Received SIGTERM, draining consumers"),
    }

    shutdown.cancel();
}
