//! Engine coordinator
//!
//! Bootstraps the consumer group, spawns one worker task per configured
//! consumer, waits for every worker to drain and deregister, then destroys
//! the group. No worker outlives the coordinator.

use crate::config::Config;
use crate::deliver::DeliveryGateway;
use crate::envelope::EventEnvelope;
use crate::error::{EngineError, Result};
use crate::group;
use crate::store::{ConsumerIdentity, StreamPool, StreamStore};
use crate::worker::ConsumerWorker;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Engine parameters
///
/// A subset of [`Config`] in engine-native types, so tests can construct
/// an engine without touching the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Consumer group name
    pub group: String,
    /// Instance identity; consumer names are `"<instance>-<index>"`
    pub instance: String,
    /// Number of consumer workers
    pub consumers: usize,
    /// Source attribute stamped on every envelope
    pub source: String,
    /// Block timeout for live reads
    pub block_timeout: Duration,
    /// Backoff after per-entry failures
    pub retry_backoff: Duration,
}

impl EngineConfig {
    /// Engine parameters from the loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            group: config.group.clone(),
            instance: config.instance.clone(),
            consumers: config.consumers,
            source: EventEnvelope::source_for(&config.address, &config.stream),
            block_timeout: config.block_timeout,
            retry_backoff: config.retry_backoff,
        }
    }
}

/// The engine - spawns and joins consumer workers
pub struct Engine<P: StreamPool> {
    pool: P,
    gateway: Arc<dyn DeliveryGateway>,
    config: EngineConfig,
}

impl<P: StreamPool> Engine<P> {
    pub fn new(pool: P, gateway: Arc<dyn DeliveryGateway>, config: EngineConfig) -> Self {
        Self {
            pool,
            gateway,
            config,
        }
    }

    /// Run the engine until the shutdown token is cancelled and every
    /// worker has drained
    ///
    /// Startup failures (unreachable store, unclassified group error)
    /// abort before any worker spawns. A group-teardown failure after
    /// shutdown is the engine's terminal error; workers are not respawned.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let mut control = self.pool.connect().await.map_err(EngineError::Startup)?;

        let outcome = group::ensure(&mut control, &self.config.group).await?;
        info!(
            group = %self.config.group,
            outcome = ?outcome,
            consumers = self.config.consumers,
            "Engine starting"
        );

        let mut handles = Vec::with_capacity(self.config.consumers);
        for index in 0..self.config.consumers {
            let store = self.pool.connect().await.map_err(EngineError::Startup)?;
            let identity =
                ConsumerIdentity::new(&self.config.group, &self.config.instance, index);
            let worker = ConsumerWorker::new(
                store,
                identity,
                Arc::clone(&self.gateway),
                self.config.source.clone(),
                self.config.block_timeout,
                self.config.retry_backoff,
                shutdown.clone(),
            );
            handles.push(tokio::spawn(worker.run()));
        }

        info!(consumers = handles.len(), "Engine started");

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Consumer task failed");
            }
        }

        control
            .destroy_group(&self.config.group)
            .await
            .map_err(EngineError::Teardown)?;
        info!(group = %self.config.group, "Consumer group destroyed");

        Ok(())
    }
}
