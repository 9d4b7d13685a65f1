//! Error types for VIRTA

use thiserror::Error;

/// Result type alias for engine-level operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine-level error type
///
/// Only startup and group-management failures reach this level; everything
/// that happens per entry is handled inside the worker loop.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection address could not be parsed or the client not constructed
    #[error("invalid stream server address: {0}")]
    InvalidAddress(String),

    /// Initial connection to the stream server failed
    #[error("cannot reach stream server: {0}")]
    Startup(#[source] StoreError),

    /// Consumer group bootstrap hit an unclassified server error
    #[error("consumer group setup failed: {0}")]
    Group(#[source] StoreError),

    /// Destroying the consumer group on shutdown failed
    #[error("consumer group teardown failed: {0}")]
    Teardown(#[source] StoreError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type for stream server commands
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport-level failure (dial, broken connection, timeout)
    #[error("connection error: {0}")]
    Connection(String),

    /// Server replied with an error
    #[error("server error: {0}")]
    Server(String),
}

impl StoreError {
    /// True when the server reported that the stream key does not exist.
    ///
    /// `XINFO GROUPS` on a missing key replies with a "no such key" class of
    /// error; some server versions phrase it as "no longer exists".
    pub fn is_missing_stream(&self) -> bool {
        match self {
            StoreError::Server(msg) => {
                msg.contains("no such key") || msg.contains("no longer exist")
            }
            StoreError::Connection(_) => false,
        }
    }

    /// True when group creation raced with another creator (`BUSYGROUP`).
    pub fn is_busy_group(&self) -> bool {
        matches!(self, StoreError::Server(msg) if msg.contains("BUSYGROUP"))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_timeout() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Server(err.to_string())
        }
    }
}

/// Error type for decoding stream server replies
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The reply carried no entries (empty pending list or block timeout).
    /// Not a failure: drives the replay-to-live transition.
    #[error("no entries in reply")]
    Empty,

    /// The reply did not contain exactly one stream element / one entry
    #[error("expected a single-stream, single-entry reply (got {0} elements)")]
    Shape(usize),

    /// The reply structure could not be parsed at all
    #[error("malformed stream reply: {0}")]
    Malformed(String),
}

/// Error type for delivery gateways
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Gateway construction failed
    #[error("initialization failed: {0}")]
    Init(String),

    /// Destination rejected the event
    #[error("send failed: {0}")]
    Send(String),

    /// Destination was unreachable
    #[error("connection error: {0}")]
    Connection(String),

    /// Retry budget exhausted - the event is lost
    #[error("delivery failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_stream_classification() {
        let err = StoreError::Server("ERR no such key".to_string());
        assert!(err.is_missing_stream());
        assert!(!err.is_busy_group());

        let err = StoreError::Server("NOGROUP No such key 'orders' or it no longer exists".to_string());
        assert!(err.is_missing_stream());

        let err = StoreError::Connection("connection refused".to_string());
        assert!(!err.is_missing_stream());
    }

    #[test]
    fn test_busy_group_classification() {
        let err = StoreError::Server("BUSYGROUP Consumer Group name already exists".to_string());
        assert!(err.is_busy_group());
        assert!(!err.is_missing_stream());
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::Startup(StoreError::Connection("refused".to_string()));
        assert!(err.to_string().contains("cannot reach stream server"));
    }
}
