use super::{CounterStore, StoreError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

/// Process-local store, used when no Redis is configured and in tests.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, i64>>,
    flags: Mutex<HashSet<String>>,
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.counters.lock().await.get(key).copied())
    }

    async fn create_if_absent(&self, key: &str) -> Result<bool, StoreError> {
        let mut counters = self.counters.lock().await;
        if counters.contains_key(key) {
            return Ok(false);
        }
        counters.insert(key.to_string(), 0);
        Ok(true)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut counters = self.counters.lock().await;
        let total = counters.entry(key.to_string()).or_insert(0);
        *total += delta;
        Ok(*total)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.flags.lock().await.contains(key))
    }

    async fn mark(&self, key: &str) -> Result<(), StoreError> {
        self.flags.lock().await.insert(key.to_string());
        Ok(())
    }
}
