//! Stream server command surface
//!
//! [`StreamStore`] abstracts the handful of commands the engine issues
//! against one stream (XINFO GROUPS, XGROUP, XREADGROUP, XACK, XADD), so
//! the worker and group bootstrap can run against test doubles.
//! [`RedisStreamStore`] is the real implementation: one connection per
//! store, dialed once and reused for every call. [`RedisPool`] is owned by
//! the coordinator and hands a fresh store to each worker at spawn time.

use crate::config::Config;
use crate::error::{EngineError, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use redis::Value;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Read cursor for a consumer-group read
///
/// Kept as an enum internally; translated to the wire sentinels (`"0"` /
/// `">"`) only when the command is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Re-deliver this consumer's own pending entries
    Replay,
    /// Claim entries never yet delivered to any group member
    Live,
}

impl Cursor {
    /// Wire sentinel for `XREADGROUP ... STREAMS <stream> <id>`
    pub fn wire(self) -> &'static str {
        match self {
            Cursor::Replay => "0",
            Cursor::Live => ">",
        }
    }
}

/// A consumer's identity within a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerIdentity {
    /// Consumer group name
    pub group: String,
    /// Consumer name, unique within the group
    pub consumer: String,
}

impl ConsumerIdentity {
    /// Derive the identity for a worker slot
    ///
    /// The consumer name is `"<instance>-<index>"`; it is never reused
    /// across restarts when the instance identity changes.
    pub fn new(group: impl Into<String>, instance: &str, index: usize) -> Self {
        Self {
            group: group.into(),
            consumer: format!("{instance}-{index}"),
        }
    }
}

/// Server-side consumer group state, snapshotted once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDescriptor {
    /// Group name
    pub name: String,
    /// Entries delivered but not yet acknowledged, across all consumers
    pub pending: u64,
}

/// The stream server command surface used by the engine
///
/// One implementor instance owns one connection; all methods are strictly
/// sequential per store.
#[async_trait]
pub trait StreamStore: Send {
    /// `XINFO GROUPS <stream>` - consumer groups on the stream
    async fn group_info(&mut self) -> Result<Vec<GroupDescriptor>, StoreError>;

    /// `XGROUP CREATE <stream> <group> $ [MKSTREAM]` - create the group,
    /// reading from the latest entry onwards
    async fn create_group(&mut self, group: &str, mkstream: bool) -> Result<(), StoreError>;

    /// `XREADGROUP ... COUNT 1 [BLOCK <ms>] STREAMS <stream> <cursor>`
    ///
    /// Returns the raw reply; `block` of zero means a non-blocking read.
    async fn read_one(
        &mut self,
        identity: &ConsumerIdentity,
        cursor: Cursor,
        block: Duration,
    ) -> Result<Value, StoreError>;

    /// `XACK <stream> <group> <id>` - remove the entry from this
    /// consumer's pending list
    async fn ack(&mut self, identity: &ConsumerIdentity, entry_id: &str)
        -> Result<(), StoreError>;

    /// `XGROUP DELCONSUMER <stream> <group> <consumer>` - deregister on
    /// drain; returns the number of pending entries discarded
    async fn remove_consumer(&mut self, identity: &ConsumerIdentity) -> Result<u64, StoreError>;

    /// `XGROUP DESTROY <stream> <group>` - teardown on full shutdown
    async fn destroy_group(&mut self, group: &str) -> Result<(), StoreError>;

    /// `XADD <stream> * <field> <value> ...` - sink-side append with a
    /// server-generated id
    async fn append(&mut self, fields: &[Bytes]) -> Result<String, StoreError>;
}

/// Redis-backed stream store
///
/// Wraps one [`ConnectionManager`], which reconnects automatically on
/// connection failures.
pub struct RedisStreamStore {
    conn: ConnectionManager,
    stream: String,
}

#[async_trait]
impl StreamStore for RedisStreamStore {
    async fn group_info(&mut self) -> Result<Vec<GroupDescriptor>, StoreError> {
        let reply: Value = redis::cmd("XINFO")
            .arg("GROUPS")
            .arg(&self.stream)
            .query_async(&mut self.conn)
            .await?;
        parse_groups(reply)
    }

    async fn create_group(&mut self, group: &str, mkstream: bool) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("XGROUP");
        cmd.arg("CREATE").arg(&self.stream).arg(group).arg("$");
        if mkstream {
            cmd.arg("MKSTREAM");
        }
        cmd.query_async::<()>(&mut self.conn).await?;
        Ok(())
    }

    async fn read_one(
        &mut self,
        identity: &ConsumerIdentity,
        cursor: Cursor,
        block: Duration,
    ) -> Result<Value, StoreError> {
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&identity.group)
            .arg(&identity.consumer)
            .arg("COUNT")
            .arg(1usize);
        // BLOCK 0 would block forever on the server; zero here means a
        // plain non-blocking read (used while draining).
        if !block.is_zero() {
            cmd.arg("BLOCK").arg(block.as_millis() as u64);
        }
        cmd.arg("STREAMS").arg(&self.stream).arg(cursor.wire());

        Ok(cmd.query_async(&mut self.conn).await?)
    }

    async fn ack(
        &mut self,
        identity: &ConsumerIdentity,
        entry_id: &str,
    ) -> Result<(), StoreError> {
        redis::cmd("XACK")
            .arg(&self.stream)
            .arg(&identity.group)
            .arg(entry_id)
            .query_async::<i64>(&mut self.conn)
            .await?;
        Ok(())
    }

    async fn remove_consumer(&mut self, identity: &ConsumerIdentity) -> Result<u64, StoreError> {
        let discarded: u64 = redis::cmd("XGROUP")
            .arg("DELCONSUMER")
            .arg(&self.stream)
            .arg(&identity.group)
            .arg(&identity.consumer)
            .query_async(&mut self.conn)
            .await?;
        Ok(discarded)
    }

    async fn destroy_group(&mut self, group: &str) -> Result<(), StoreError> {
        redis::cmd("XGROUP")
            .arg("DESTROY")
            .arg(&self.stream)
            .arg(group)
            .query_async::<i64>(&mut self.conn)
            .await?;
        Ok(())
    }

    async fn append(&mut self, fields: &[Bytes]) -> Result<String, StoreError> {
        let mut cmd = redis::cmd("XADD");
        cmd.arg(&self.stream).arg("*");
        for value in fields {
            cmd.arg(&value[..]);
        }
        let id: String = cmd.query_async(&mut self.conn).await?;
        Ok(id)
    }
}

/// Parse an `XINFO GROUPS` reply
///
/// Each group is a flat key/value array (RESP2); only the name and pending
/// count are kept.
fn parse_groups(reply: Value) -> Result<Vec<GroupDescriptor>, StoreError> {
    let groups = match reply {
        Value::Array(groups) => groups,
        other => {
            return Err(StoreError::Server(format!(
                "unexpected XINFO GROUPS reply: {other:?}"
            )))
        }
    };

    groups
        .into_iter()
        .map(|group| {
            let pairs = match group {
                Value::Array(pairs) => pairs,
                Value::Map(map) => map.into_iter().flat_map(|(k, v)| [k, v]).collect(),
                other => {
                    return Err(StoreError::Server(format!(
                        "unexpected group descriptor: {other:?}"
                    )))
                }
            };

            let mut descriptor = GroupDescriptor {
                name: String::new(),
                pending: 0,
            };
            for chunk in pairs.chunks_exact(2) {
                let (key, value) = (&chunk[0], &chunk[1]);
                match redis::from_redis_value::<String>(key).as_deref() {
                    Ok("name") => {
                        descriptor.name = redis::from_redis_value(value)
                            .map_err(|e| StoreError::Server(e.to_string()))?;
                    }
                    Ok("pending") => {
                        descriptor.pending = redis::from_redis_value(value)
                            .map_err(|e| StoreError::Server(e.to_string()))?;
                    }
                    _ => {}
                }
            }
            Ok(descriptor)
        })
        .collect()
}

/// Connection pool for the engine
///
/// Constructed once at startup from the configured address; dial failures
/// surface as startup errors instead of panics. Cheap to share: each
/// `connect` call yields an independent store.
pub struct RedisPool {
    client: redis::Client,
    stream: String,
}

impl RedisPool {
    /// Build the pool from configuration
    ///
    /// When a CA bundle is configured it is loaded into the client's TLS
    /// material for `rediss://` addresses.
    pub fn new(config: &Config) -> Result<Self, EngineError> {
        let client = match &config.tls_ca {
            Some(path) => {
                let root_cert = std::fs::read(path)?;
                redis::Client::build_with_tls(
                    config.address.as_str(),
                    redis::TlsCertificates {
                        client_tls: None,
                        root_cert: Some(root_cert),
                    },
                )
                .map_err(|e| EngineError::InvalidAddress(format!("{}: {e}", config.address)))?
            }
            None => redis::Client::open(config.address.as_str())
                .map_err(|e| EngineError::InvalidAddress(format!("{}: {e}", config.address)))?,
        };

        Ok(Self {
            client,
            stream: config.stream.clone(),
        })
    }
}

/// Source of per-worker stores
///
/// The coordinator owns one pool and hands each worker its own store.
#[async_trait]
pub trait StreamPool: Send + Sync {
    type Store: StreamStore + Send + Sync + 'static;

    /// Open a new store with its own connection
    async fn connect(&self) -> Result<Self::Store, StoreError>;
}

#[async_trait]
impl StreamPool for RedisPool {
    type Store = RedisStreamStore;

    async fn connect(&self) -> Result<RedisStreamStore, StoreError> {
        let conn = ConnectionManager::new(self.client.clone()).await?;
        Ok(RedisStreamStore {
            conn,
            stream: self.stream.clone(),
        })
    }
}
