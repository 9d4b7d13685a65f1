//! Consumer worker - the core consumption loop
//!
//! One worker owns one consumer identity within the group and one store
//! connection. It starts in replay mode, re-delivering its own pending
//! entries with cursor `"0"` until the server reports none left, then
//! switches permanently to live reads with cursor `">"`. Each entry is
//! read, delivered, and acknowledged strictly in sequence; nothing is
//! pipelined.
//!
//! Failure policy:
//! - read and decode errors are retried indefinitely with a fixed backoff;
//! - a delivery error past the gateway's retry budget means the event is
//!   lost (logged), the entry is still acknowledged so it cannot wedge the
//!   pending list forever;
//! - an acknowledgment failure forces the cursor back to replay, trading
//!   a possible duplicate for the guarantee that the entry is not dropped.
//!
//! On cancellation the worker drains: it replays its pending list with
//! non-blocking reads until empty, deregisters its consumer, and stops.

use crate::codec;
use crate::deliver::DeliveryGateway;
use crate::envelope::EventEnvelope;
use crate::error::DecodeError;
use crate::store::{ConsumerIdentity, Cursor, StreamStore};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// An entry was read, delivered (or lost), and acknowledged
    Processed,
    /// The read came back empty
    Empty,
    /// A retryable failure occurred; the cursor may have been reset
    Retried,
}

/// A single consumer within the group
pub struct ConsumerWorker<S> {
    store: S,
    identity: ConsumerIdentity,
    gateway: Arc<dyn DeliveryGateway>,
    /// Source attribute stamped on every envelope
    source: String,
    /// Block timeout for live reads
    block: Duration,
    /// Pause after read/decode/ack failures
    backoff: Duration,
    cursor: Cursor,
    shutdown: CancellationToken,
}

impl<S: StreamStore> ConsumerWorker<S> {
    pub fn new(
        store: S,
        identity: ConsumerIdentity,
        gateway: Arc<dyn DeliveryGateway>,
        source: impl Into<String>,
        block: Duration,
        backoff: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            identity,
            gateway,
            source: source.into(),
            block,
            backoff,
            cursor: Cursor::Replay,
            shutdown,
        }
    }

    /// Run the consumption loop until cancelled, then drain and deregister
    ///
    /// Cancellation is observed between iterations only; an in-flight
    /// read or ack is never aborted.
    pub async fn run(mut self) {
        info!(consumer = %self.identity.consumer, "Consumer started");

        while !self.shutdown.is_cancelled() {
            self.step(false).await;
        }

        self.drain().await;

        match self.store.remove_consumer(&self.identity).await {
            Ok(discarded) => {
                info!(consumer = %self.identity.consumer, discarded, "Consumer deregistered")
            }
            Err(e) => {
                warn!(consumer = %self.identity.consumer, error = %e, "Failed to deregister consumer")
            }
        }

        info!(consumer = %self.identity.consumer, "Consumer stopped");
    }

    /// Replay the pending list to empty before shutting down
    ///
    /// Reads are non-blocking and failures are not slept on; the operator
    /// timeout is the backstop if the server stays unreachable.
    async fn drain(&mut self) {
        debug!(consumer = %self.identity.consumer, "Draining pending entries");
        self.cursor = Cursor::Replay;

        while self.step(true).await != Step::Empty {}
    }

    /// One iteration: read, deliver, acknowledge
    async fn step(&mut self, draining: bool) -> Step {
        let block = if draining { Duration::ZERO } else { self.block };

        let reply = match self.store.read_one(&self.identity, self.cursor, block).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(consumer = %self.identity.consumer, error = %e, "Stream read failed");
                self.pause(draining).await;
                return Step::Retried;
            }
        };

        let entry = match codec::decode_one(reply) {
            Ok(entry) => entry,
            Err(DecodeError::Empty) => {
                if self.cursor == Cursor::Replay && !draining {
                    debug!(
                        consumer = %self.identity.consumer,
                        "Pending entries replayed; switching to live reads"
                    );
                    self.cursor = Cursor::Live;
                }
                return Step::Empty;
            }
            Err(e) => {
                // A shape violation means the server is not speaking the
                // expected protocol; loud, but retried like a transient.
                error!(consumer = %self.identity.consumer, error = %e, "Malformed stream reply");
                self.pause(draining).await;
                return Step::Retried;
            }
        };

        debug!(consumer = %self.identity.consumer, id = %entry.id, "Entry read");

        let envelope = EventEnvelope::from_entry(self.source.clone(), entry);

        match self.gateway.send(&envelope).await {
            Ok(()) => {
                debug!(consumer = %self.identity.consumer, id = %envelope.id, "Event delivered")
            }
            // The gateway's retry budget is spent. The entry is still
            // acknowledged below so a dead destination cannot wedge the
            // pending list.
            Err(e) => {
                error!(
                    consumer = %self.identity.consumer,
                    id = %envelope.id,
                    error = %e,
                    "Event lost: delivery retries exhausted"
                )
            }
        }

        if let Err(e) = self.store.ack(&self.identity, &envelope.id).await {
            warn!(
                consumer = %self.identity.consumer,
                id = %envelope.id,
                error = %e,
                "Ack failed; forcing replay"
            );
            self.cursor = Cursor::Replay;
            self.pause(draining).await;
            return Step::Retried;
        }

        debug!(consumer = %self.identity.consumer, id = %envelope.id, "Entry acked");
        Step::Processed
    }

    async fn pause(&self, draining: bool) {
        if !draining {
            tokio::time::sleep(self.backoff).await;
        }
    }
}
