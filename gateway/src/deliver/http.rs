//! HTTP delivery gateway
//!
//! POSTs each envelope to an HTTP endpoint: attributes travel as headers,
//! the field/value payload as a JSON array of base64-encoded values.
//!
//! # Example
//!
//! ```ignore
//! let gateway = HttpGateway::new("https://broker.example.com/events")?
//!     .header("Authorization", "Bearer token123");
//! ```

use crate::deliver::DeliveryGateway;
use crate::envelope::EventEnvelope;
use crate::error::GatewayError;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error};

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default connection timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP delivery gateway - POSTs envelopes as JSON
pub struct HttpGateway {
    client: Client,
    url: String,
    health_url: Option<String>,
    headers: HashMap<String, String>,
}

impl HttpGateway {
    /// Create a new HttpGateway for the given URL
    ///
    /// Uses default timeouts: 30s request timeout, 10s connection timeout
    ///
    /// # Errors
    /// Returns [`GatewayError::Init`] if the HTTP client cannot be created
    pub fn new(url: impl Into<String>) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| GatewayError::Init(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            health_url: None,
            headers: HashMap::new(),
        })
    }

    /// Set a custom health check URL
    ///
    /// By default, health checks use a HEAD request to the delivery URL.
    pub fn health_url(mut self, url: impl Into<String>) -> Self {
        self.health_url = Some(url.into());
        self
    }

    /// Add a custom header to all requests
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl DeliveryGateway for HttpGateway {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&self, envelope: &EventEnvelope) -> Result<(), GatewayError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("content-type", &envelope.content_type)
            .header("x-virta-id", &envelope.id)
            .header("x-virta-type", &envelope.event_type)
            .header("x-virta-source", &envelope.source)
            .json(&envelope.payload_base64());

        if let Some(time) = envelope.time {
            request = request.header("x-virta-time", time.to_rfc3339());
        }

        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        match request.send().await {
            Ok(response) => {
                if response.status().is_success() {
                    debug!(
                        url = %self.url,
                        id = %envelope.id,
                        status = %response.status(),
                        "Event delivered"
                    );
                    Ok(())
                } else {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    error!(
                        url = %self.url,
                        id = %envelope.id,
                        status = %status,
                        body = %body,
                        "Destination rejected event"
                    );
                    Err(GatewayError::Send(format!(
                        "destination returned {status}: {body}"
                    )))
                }
            }
            Err(e) => {
                error!(url = %self.url, id = %envelope.id, error = %e, "Destination unreachable");
                Err(GatewayError::Connection(format!(
                    "failed to connect to {}: {e}",
                    self.url
                )))
            }
        }
    }

    async fn health(&self) -> bool {
        let url = self.health_url.as_ref().unwrap_or(&self.url);

        // HEAD is less invasive than GET for POST-only endpoints; any
        // response means the destination is reachable.
        match self.client.head(url).send().await {
            Ok(response) => {
                let healthy = response.status().is_success()
                    || response.status().is_client_error()
                    || response.status().is_redirection();
                if !healthy {
                    debug!(
                        url = %url,
                        status = %response.status(),
                        "Health check returned server error"
                    );
                }
                healthy
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::post,
    };
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use bytes::Bytes;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// One received delivery: envelope headers plus decoded payload
    #[derive(Debug, Clone)]
    struct Received {
        id: String,
        source: String,
        payload: Vec<Vec<u8>>,
    }

    #[derive(Default)]
    struct MockServerState {
        received: Mutex<Vec<Received>>,
    }

    async fn start_mock_server() -> (SocketAddr, Arc<MockServerState>) {
        let state = Arc::new(MockServerState::default());

        let app = Router::new()
            .route("/events", post(handle_events).head(handle_head))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;

        (addr, state)
    }

    async fn handle_events(
        State(state): State<Arc<MockServerState>>,
        headers: HeaderMap,
        Json(values): Json<Vec<String>>,
    ) -> StatusCode {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        let payload = values
            .iter()
            .map(|v| BASE64.decode(v).unwrap())
            .collect();
        state.received.lock().await.push(Received {
            id: header("x-virta-id"),
            source: header("x-virta-source"),
            payload,
        });
        StatusCode::OK
    }

    async fn handle_head() -> StatusCode {
        StatusCode::OK
    }

    fn make_envelope(id: &str) -> EventEnvelope {
        EventEnvelope::from_entry(
            "redis://localhost:6379/orders",
            crate::codec::StreamEntry {
                id: id.to_string(),
                fields: vec![Bytes::from("qty"), Bytes::from("5")],
            },
        )
    }

    #[tokio::test]
    async fn test_http_gateway_creates() {
        let gateway = HttpGateway::new("http://localhost:8080/events").unwrap();
        assert_eq!(gateway.name(), "http");
    }

    #[tokio::test]
    async fn test_http_gateway_delivers_envelope() {
        let (addr, state) = start_mock_server().await;
        let url = format!("http://{addr}/events");

        let gateway = HttpGateway::new(&url).unwrap();
        gateway.send(&make_envelope("1519073278252-0")).await.unwrap();

        let received = state.received.lock().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].id, "1519073278252-0");
        assert_eq!(received[0].source, "redis://localhost:6379/orders");
        assert_eq!(received[0].payload, vec![b"qty".to_vec(), b"5".to_vec()]);
    }

    #[tokio::test]
    async fn test_http_gateway_health_check() {
        let (addr, _state) = start_mock_server().await;
        let url = format!("http://{addr}/events");

        let gateway = HttpGateway::new(&url).unwrap();
        assert!(gateway.health().await);
    }

    #[tokio::test]
    async fn test_http_gateway_failure_on_bad_url() {
        let gateway = HttpGateway::new("http://127.0.0.1:1/events").unwrap();

        let result = gateway.send(&make_envelope("1-0")).await;
        assert!(matches!(result, Err(GatewayError::Connection(_))));
    }

    #[tokio::test]
    async fn test_http_gateway_rejection_is_send_error() {
        async fn reject() -> StatusCode {
            StatusCode::INTERNAL_SERVER_ERROR
        }

        let app = Router::new().route("/events", post(reject));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;

        let gateway = HttpGateway::new(format!("http://{addr}/events")).unwrap();
        let result = gateway.send(&make_envelope("1-0")).await;
        assert!(matches!(result, Err(GatewayError::Send(_))));
    }
}
