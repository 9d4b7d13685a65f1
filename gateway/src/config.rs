//! Configuration for VIRTA

use crate::error::{EngineError, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for VIRTA
///
/// Loaded from `VIRTA_*` environment variables. The same configuration is
/// shared by the source engine and the sink receiver; `target` is only
/// required by the source binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Stream server address (`redis://` or `rediss://` URL)
    pub address: String,

    /// Stream key to consume from / append to
    pub stream: String,

    /// Consumer group name
    pub group: String,

    /// Instance identity (pod name); consumer names are derived from it
    pub instance: String,

    /// Number of consumer workers
    pub consumers: usize,

    /// Event destination URL (source engine only)
    pub target: Option<String>,

    /// Block timeout for a single stream read
    pub block_timeout: Duration,

    /// Backoff delay after read/decode/ack failures
    pub retry_backoff: Duration,

    /// Optional CA bundle (PEM file) for `rediss://` connections
    pub tls_ca: Option<PathBuf>,

    /// Sink receiver listen address
    pub receiver_addr: SocketAddr,

    /// Log level
    pub log_level: String,

    /// Log format (json or pretty)
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: String::new(),
            stream: String::new(),
            group: "virta".to_string(),
            instance: "virta".to_string(),
            consumers: 1,
            target: None,
            block_timeout: Duration::from_millis(5000),
            retry_backoff: Duration::from_millis(1000),
            tls_ca: None,
            receiver_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        config.address = env::var("VIRTA_ADDRESS")
            .map_err(|_| EngineError::Config("VIRTA_ADDRESS is required".to_string()))?;

        config.stream = env::var("VIRTA_STREAM")
            .map_err(|_| EngineError::Config("VIRTA_STREAM is required".to_string()))?;

        if let Ok(group) = env::var("VIRTA_GROUP") {
            config.group = group;
        }

        if let Ok(name) = env::var("VIRTA_NAME") {
            config.instance = name;
        }

        if let Ok(count) = env::var("VIRTA_CONSUMERS") {
            config.consumers = count
                .parse()
                .map_err(|e| EngineError::Config(format!("invalid VIRTA_CONSUMERS: {e}")))?;
            if config.consumers == 0 {
                return Err(EngineError::Config(
                    "VIRTA_CONSUMERS must be at least 1".to_string(),
                ));
            }
        }

        if let Ok(target) = env::var("VIRTA_TARGET") {
            config.target = Some(target);
        }

        if let Ok(ms) = env::var("VIRTA_BLOCK_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|e| EngineError::Config(format!("invalid VIRTA_BLOCK_MS: {e}")))?;
            config.block_timeout = Duration::from_millis(ms);
        }

        if let Ok(ms) = env::var("VIRTA_RETRY_BACKOFF_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|e| EngineError::Config(format!("invalid VIRTA_RETRY_BACKOFF_MS: {e}")))?;
            config.retry_backoff = Duration::from_millis(ms);
        }

        if let Ok(path) = env::var("VIRTA_TLS_CA") {
            config.tls_ca = Some(PathBuf::from(path));
        }

        if let Ok(addr) = env::var("VIRTA_RECEIVER_ADDR") {
            config.receiver_addr = addr
                .parse()
                .map_err(|e| EngineError::Config(format!("invalid VIRTA_RECEIVER_ADDR: {e}")))?;
        }

        if let Ok(level) = env::var("VIRTA_LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(format) = env::var("VIRTA_LOG_FORMAT") {
            config.log_format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    return Err(EngineError::Config(format!(
                        "invalid VIRTA_LOG_FORMAT: {other} (expected 'json' or 'pretty')"
                    )))
                }
            };
        }

        Ok(config)
    }

    /// Destination URL, required by the source engine
    pub fn require_target(&self) -> Result<&str> {
        self.target
            .as_deref()
            .ok_or_else(|| EngineError::Config("VIRTA_TARGET is required".to_string()))
    }
}
