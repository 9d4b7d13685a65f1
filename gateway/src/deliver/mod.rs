//! Delivery gateways for VIRTA
//!
//! A gateway sends one [`EventEnvelope`] to a destination and reports the
//! final outcome. Retry policy is the gateway's own concern: the worker
//! calls [`DeliveryGateway::send`] once per entry and treats an error as a
//! lost event, never retrying past the gateway's budget.

pub mod http;
pub mod retry;
pub mod stdout;

use crate::envelope::EventEnvelope;
use crate::error::GatewayError;
use async_trait::async_trait;

pub use http::HttpGateway;
pub use retry::{BackoffConfig, RetryGateway};
pub use stdout::StdoutGateway;

/// Gateway trait - sends envelopes to a destination
///
/// # Example
///
/// ```ignore
/// struct MyDestinationGateway {
///     client: MyClient,
/// }
///
/// #[async_trait]
/// impl DeliveryGateway for MyDestinationGateway {
///     fn name(&self) -> &'static str { "my-destination" }
///
///     async fn send(&self, envelope: &EventEnvelope) -> Result<(), GatewayError> {
///         self.client.post(envelope).await?;
///         Ok(())
///     }
///
///     async fn health(&self) -> bool {
///         self.client.ping().await.is_ok()
///     }
/// }
/// ```
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Gateway name for identification and logging
    fn name(&self) -> &'static str;

    /// Send an envelope to the destination
    ///
    /// A returned error is final: the event is considered lost by the
    /// caller. Delivery may take up to the gateway's full retry budget.
    async fn send(&self, envelope: &EventEnvelope) -> Result<(), GatewayError>;

    /// Health check for the destination
    async fn health(&self) -> bool;
}
