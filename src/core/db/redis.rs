use super::{CounterStore, StoreError};
use async_trait::async_trait;
use redis::{AsyncCommands, Client};

#[derive(Clone)]
pub struct RedisCounterStore {
    client: Client,
}

impl RedisCounterStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let mut con = self.client.get_multiplexed_tokio_connection().await?;
        Ok(con.get(key).await?)
    }

    async fn create_if_absent(&self, key: &str) -> Result<bool, StoreError> {
        let mut con = self.client.get_multiplexed_tokio_connection().await?;
        Ok(con.set_nx(key, 0i64).await?)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut con = self.client.get_multiplexed_tokio_connection().await?;
        Ok(con.incr(key, delta).await?)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut con = self.client.get_multiplexed_tokio_connection().await?;
        Ok(con.exists(key).await?)
    }

    async fn mark(&self, key: &str) -> Result<(), StoreError> {
        let mut con = self.client.get_multiplexed_tokio_connection().await?;
        let _: () = con.set(key, 1i64).await?;
        Ok(())
    }
}
