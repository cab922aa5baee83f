pub mod memory;
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis Error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Keyed integer counters with an atomic add, plus presence flags.
///
/// Implementations must make `incr_by` atomic per key: two concurrent adds to
/// the same key both land.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Creates the counter at zero. Returns `false` if it already existed.
    async fn create_if_absent(&self, key: &str) -> Result<bool, StoreError>;

    /// Adds `delta` and returns the new total. A missing counter starts at zero.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn mark(&self, key: &str) -> Result<(), StoreError>;
}
