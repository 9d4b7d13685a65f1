//! VIRTA - Redis Stream to Event Pipeline Gateway
//!
//! VIRTA bridges a Redis Stream and an external event pipeline. The source
//! engine claims a consumer-group identity, reads pending and new stream
//! entries, converts them into event envelopes and forwards them to an HTTP
//! destination with bounded retry, acknowledging each entry afterwards. The
//! sink receiver accepts inbound events over HTTP and appends them to a
//! stream.
//!
//! # Architecture
//!
//! ```text
//! Redis Stream ──► ConsumerWorkers (XREADGROUP/XACK) ──► DeliveryGateway ──► destination
//! destination  ──► Receiver (HTTP) ──► XADD ──► Redis Stream
//! ```
//!
//! Delivery destinations are pluggable via the [`DeliveryGateway`] trait.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod codec;
pub mod config;
pub mod deliver;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod group;
pub mod receiver;
pub mod store;
pub mod worker;

pub use codec::StreamEntry;
pub use config::{Config, LogFormat};
pub use deliver::{BackoffConfig, DeliveryGateway, HttpGateway, RetryGateway, StdoutGateway};
pub use engine::{Engine, EngineConfig};
pub use envelope::EventEnvelope;
pub use error::{DecodeError, EngineError, GatewayError, StoreError};
pub use group::{Ensure, ensure};
pub use store::{
    ConsumerIdentity, Cursor, GroupDescriptor, RedisPool, RedisStreamStore, StreamPool, StreamStore,
};
pub use worker::ConsumerWorker;
