//! Stdout gateway for debugging
//!
//! Prints envelopes in a human-readable format instead of delivering them.
//! Useful for development and for running the engine against a scratch
//! stream.

use crate::deliver::DeliveryGateway;
use crate::envelope::EventEnvelope;
use crate::error::GatewayError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stdout gateway - prints envelopes for debugging
pub struct StdoutGateway {
    /// Pretty print envelopes
    pretty: bool,
    /// Count of envelopes printed
    sent_count: AtomicU64,
}

impl StdoutGateway {
    /// Create a new StdoutGateway
    pub fn new() -> Self {
        Self {
            pretty: false,
            sent_count: AtomicU64::new(0),
        }
    }

    /// Create a new StdoutGateway with pretty printing
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            sent_count: AtomicU64::new(0),
        }
    }

    /// Get total envelopes printed
    pub fn sent_count(&self) -> u64 {
        self.sent_count.load(Ordering::Relaxed)
    }
}

impl Default for StdoutGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryGateway for StdoutGateway {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn send(&self, envelope: &EventEnvelope) -> Result<(), GatewayError> {
        use std::io::Write;

        let mut stdout = std::io::stdout().lock();

        if self.pretty {
            writeln!(
                stdout,
                "┌─ Event ─────────────────────────────────────────────",
            )
            .ok();
            writeln!(stdout, "│ ID:      {}", envelope.id).ok();
            writeln!(stdout, "│ Source:  {}", envelope.source).ok();
            writeln!(stdout, "│ Type:    {}", envelope.event_type).ok();
            if let Some(time) = envelope.time {
                writeln!(stdout, "│ Time:    {}", time.to_rfc3339()).ok();
            }
            writeln!(
                stdout,
                "│ Payload: {} values, {} bytes",
                envelope.payload.len(),
                envelope.payload_len()
            )
            .ok();
            writeln!(
                stdout,
                "└─────────────────────────────────────────────────────",
            )
            .ok();
        } else {
            writeln!(
                stdout,
                "[{}] {}:{} ({} bytes)",
                envelope.source,
                envelope.event_type,
                envelope.id,
                envelope.payload_len()
            )
            .ok();
        }

        self.sent_count.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    async fn health(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::Bytes;

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
    async fn test_send_counts_envelopes() {
        let gateway = StdoutGateway::new();
        gateway.send(&make_envelope("1-0")).await.unwrap();
        gateway.send(&make_envelope("2-0")).await.unwrap();

        assert_eq!(gateway.sent_count(), 2);
    }

    #[tokio::test]
    async fn test_pretty_send() {
        let gateway = StdoutGateway::pretty();
        gateway.send(&make_envelope("1-0")).await.unwrap();
        assert_eq!(gateway.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_health() {
        let gateway = StdoutGateway::new();
        assert!(gateway.health().await);
    }
}
