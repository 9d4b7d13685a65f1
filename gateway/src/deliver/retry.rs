//! Retry wrapper for delivery gateways
//!
//! Wraps any [`DeliveryGateway`] with bounded exponential backoff. The
//! budget is fixed: once `max_attempts` sends have failed, the last error
//! is reported as [`GatewayError::Exhausted`] and the event is lost.

use crate::deliver::DeliveryGateway;
use crate::envelope::EventEnvelope;
use crate::error::GatewayError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Backoff configuration for [`RetryGateway`]
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Total number of send attempts (including the first)
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Multiplier applied per subsequent attempt
    pub multiplier: f64,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl BackoffConfig {
    /// Delay to sleep after the given failed attempt (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = self.initial_delay.mul_f64(factor);
        delay.min(self.max_delay)
    }
}

/// Gateway decorator applying bounded exponential backoff
pub struct RetryGateway {
    inner: Arc<dyn DeliveryGateway>,
    config: BackoffConfig,
}

impl RetryGateway {
    /// Wrap a gateway with the given backoff configuration
    pub fn new(inner: Arc<dyn DeliveryGateway>, config: BackoffConfig) -> Self {
        Self { inner, config }
    }

    /// Wrap an owned gateway
    pub fn wrap<G: DeliveryGateway + 'static>(gateway: G, config: BackoffConfig) -> Self {
        Self::new(Arc::new(gateway), config)
    }
}

#[async_trait]
impl DeliveryGateway for RetryGateway {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn send(&self, envelope: &EventEnvelope) -> Result<(), GatewayError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.inner.send(envelope).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt >= self.config.max_attempts => {
                    return Err(GatewayError::Exhausted {
                        attempts: attempt,
                        last: err.to_string(),
                    });
                }
                Err(err) => {
                    let delay = self.config.delay(attempt);
                    warn!(
                        gateway = self.inner.name(),
                        id = %envelope.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Delivery failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn health(&self) -> bool {
        self.inner.health().await
    }
}
