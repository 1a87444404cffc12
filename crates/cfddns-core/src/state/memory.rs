// # Memory State Store
//
// In-memory implementation of StateStore.
//
// Nothing survives the process, so every record looks new on the next run.
// Useful for tests and for one-off runs that must not touch the cache.

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::RecordType;
use crate::traits::state_store::StateStore;

/// In-memory state store implementation
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<HashMap<(String, RecordType), IpAddr>>>,
}

impl MemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached pairs
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether nothing is cached
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_last_ip(
        &self,
        record_name: &str,
        record_type: RecordType,
    ) -> Result<Option<IpAddr>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(&(record_name.to_string(), record_type)).copied())
    }

    async fn set_last_ip(
        &self,
        record_name: &str,
        record_type: RecordType,
        ip: IpAddr,
    ) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert((record_name.to_string(), record_type), ip);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStateStore::new();
        assert!(store.is_empty().await);

        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        store.set_last_ip("example.com", RecordType::A, ip).await.unwrap();

        assert_eq!(
            store.get_last_ip("example.com", RecordType::A).await.unwrap(),
            Some(ip)
        );
        assert_eq!(
            store.get_last_ip("example.com", RecordType::Aaaa).await.unwrap(),
            None
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryStateStore::new();
        let clone = store.clone();

        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        clone.set_last_ip("example.com", RecordType::A, ip).await.unwrap();

        assert_eq!(
            store.get_last_ip("example.com", RecordType::A).await.unwrap(),
            Some(ip)
        );
    }
}
