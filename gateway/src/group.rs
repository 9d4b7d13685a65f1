//! Consumer group bootstrap
//!
//! Ensures the consumer group exists on the stream before any worker
//! spawns, creating the stream and group when either is absent. Repeating
//! [`ensure`] after success is a no-op.

use crate::error::EngineError;
use crate::store::StreamStore;
use tracing::{debug, info};

/// Outcome of a group bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensure {
    /// The group (and possibly the stream) was created, reading from the
    /// latest entry onwards
    Created,
    /// The group already existed; server-side state untouched
    Reused,
}

/// Ensure the consumer group exists on the stream
///
/// Outcomes:
/// 1. Stream missing - create stream and group atomically (`MKSTREAM`).
/// 2. Group present - reuse it.
/// 3. Stream present, group absent - create the group.
///
/// Any other failure aborts engine startup.
pub async fn ensure<S: StreamStore>(store: &mut S, group: &str) -> Result<Ensure, EngineError> {
    let groups = match store.group_info().await {
        Ok(groups) => groups,
        Err(err) if err.is_missing_stream() => {
            debug!(group, "stream does not exist; creating it with the group");
            return create(store, group, true).await;
        }
        Err(err) => return Err(EngineError::Group(err)),
    };

    if let Some(existing) = groups.iter().find(|g| g.name == group) {
        info!(
            group,
            pending = existing.pending,
            "consumer group reused"
        );
        return Ok(Ensure::Reused);
    }

    create(store, group, false).await
}

async fn create<S: StreamStore>(
    store: &mut S,
    group: &str,
    mkstream: bool,
) -> Result<Ensure, EngineError> {
    match store.create_group(group, mkstream).await {
        Ok(()) => {
            info!(group, "consumer group created");
            Ok(Ensure::Created)
        }
        // Lost a creation race with another engine instance.
        Err(err) if err.is_busy_group() => {
            info!(group, "consumer group reused");
            Ok(Ensure::Reused)
        }
        Err(err) => Err(EngineError::Group(err)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{ConsumerIdentity, Cursor, GroupDescriptor};
    use async_trait::async_trait;
    use bytes::Bytes;
    use redis::Value;
    use std::time::Duration;

    /// Minimal in-memory store: just enough server-side group state for
    /// bootstrap scenarios.
    #[derive(Default)]
    struct BootstrapStore {
        stream_exists: bool,
        groups: Vec<GroupDescriptor>,
        creates: usize,
    }

    #[async_trait]
    impl StreamStore for BootstrapStore {
        async fn group_info(&mut self) -> Result<Vec<GroupDescriptor>, StoreError> {
            if !self.stream_exists {
                return Err(StoreError::Server("ERR no such key".to_string()));
            }
            Ok(self.groups.clone())
        }

        async fn create_group(&mut self, group: &str, mkstream: bool) -> Result<(), StoreError> {
            if !self.stream_exists && !mkstream {
                return Err(StoreError::Server("ERR no such key".to_string()));
            }
            if self.groups.iter().any(|g| g.name == group) {
                return Err(StoreError::Server(
                    "BUSYGROUP Consumer Group name already exists".to_string(),
                ));
            }
            self.stream_exists = true;
            self.groups.push(GroupDescriptor {
                name: group.to_string(),
                pending: 0,
            });
            self.creates += 1;
            Ok(())
        }

        async fn read_one(
            &mut self,
            _identity: &ConsumerIdentity,
            _cursor: Cursor,
            _block: Duration,
        ) -> Result<Value, StoreError> {
            Ok(Value::Nil)
        }

        async fn ack(
            &mut self,
            _identity: &ConsumerIdentity,
            _entry_id: &str,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn remove_consumer(
            &mut self,
            _identity: &ConsumerIdentity,
        ) -> Result<u64, StoreError> {
            Ok(0)
        }

        async fn destroy_group(&mut self, _group: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn append(&mut self, _fields: &[Bytes]) -> Result<String, StoreError> {
            Err(StoreError::Server("append not supported here".to_string()))
        }
    }

    #[tokio::test]
    async fn test_ensure_creates_missing_stream_and_group() {
        let mut store = BootstrapStore::default();

        let outcome = ensure(&mut store, "g1").await.unwrap();
        assert_eq!(outcome, Ensure::Created);
        assert!(store.stream_exists);
        assert_eq!(store.creates, 1);
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let mut store = BootstrapStore::default();

        assert_eq!(ensure(&mut store, "g1").await.unwrap(), Ensure::Created);
        assert_eq!(ensure(&mut store, "g1").await.unwrap(), Ensure::Reused);
        assert_eq!(store.creates, 1);
    }

    #[tokio::test]
    async fn test_ensure_creates_group_on_existing_stream() {
        let mut store = BootstrapStore {
            stream_exists: true,
            ..Default::default()
        };

        assert_eq!(ensure(&mut store, "g1").await.unwrap(), Ensure::Created);
    }

    #[tokio::test]
    async fn test_ensure_busygroup_race_is_reused() {
        // group_info sees no group, but creation hits BUSYGROUP.
        struct RacingStore(BootstrapStore);

        #[async_trait]
        impl StreamStore for RacingStore {
            async fn group_info(&mut self) -> Result<Vec<GroupDescriptor>, StoreError> {
                Ok(vec![])
            }
            async fn create_group(&mut self, g: &str, mk: bool) -> Result<(), StoreError> {
                self.0.groups.push(GroupDescriptor {
                    name: g.to_string(),
                    pending: 0,
                });
                let _ = mk;
                Err(StoreError::Server("BUSYGROUP already exists".to_string()))
            }
            async fn read_one(
                &mut self,
                i: &ConsumerIdentity,
                c: Cursor,
                b: Duration,
            ) -> Result<Value, StoreError> {
                self.0.read_one(i, c, b).await
            }
            async fn ack(&mut self, i: &ConsumerIdentity, e: &str) -> Result<(), StoreError> {
                self.0.ack(i, e).await
            }
            async fn remove_consumer(&mut self, i: &ConsumerIdentity) -> Result<u64, StoreError> {
                self.0.remove_consumer(i).await
            }
            async fn destroy_group(&mut self, g: &str) -> Result<(), StoreError> {
                self.0.destroy_group(g).await
            }
            async fn append(&mut self, f: &[Bytes]) -> Result<String, StoreError> {
                self.0.append(f).await
            }
        }

        let mut store = RacingStore(BootstrapStore {
            stream_exists: true,
            ..Default::default()
        });
        assert_eq!(ensure(&mut store, "g1").await.unwrap(), Ensure::Reused);
    }

    #[tokio::test]
    async fn test_ensure_propagates_unclassified_errors() {
        struct BrokenStore;

        #[async_trait]
        impl StreamStore for BrokenStore {
            async fn group_info(&mut self) -> Result<Vec<GroupDescriptor>, StoreError> {
                Err(StoreError::Connection("connection reset".to_string()))
            }
            async fn create_group(&mut self, _: &str, _: bool) -> Result<(), StoreError> {
                Ok(())
            }
            async fn read_one(
                &mut self,
                _: &ConsumerIdentity,
                _: Cursor,
                _: Duration,
            ) -> Result<Value, StoreError> {
                Ok(Value::Nil)
            }
            async fn ack(&mut self, _: &ConsumerIdentity, _: &str) -> Result<(), StoreError> {
                Ok(())
            }
            async fn remove_consumer(&mut self, _: &ConsumerIdentity) -> Result<u64, StoreError> {
                Ok(0)
            }
            async fn destroy_group(&mut self, _: &str) -> Result<(), StoreError> {
                Ok(())
            }
            async fn append(&mut self, _: &[Bytes]) -> Result<String, StoreError> {
                Ok(String::new())
            }
        }

        let err = ensure(&mut BrokenStore, "g1").await.unwrap_err();
        assert!(matches!(err, EngineError::Group(_)));
    }
}
