//! Redis queue backend.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::info;

use super::Queue;
use crate::config::RedisConfig;
use crate::error::TransportError;

/// Redis lists reached over one multiplexed connection
#[derive(Clone)]
pub struct RedisQueue {
    connection: MultiplexedConnection,
}

impl RedisQueue {
    /// Open the connection and select the configured database
    pub async fn connect(config: &RedisConfig) -> Result<Self, TransportError> {
        let client = redis::Client::open(config.url())?;
        let connection = client.get_multiplexed_async_connection().await?;

        info!(address = %config.address, database = config.database, "Connected to Redis");
        Ok(Self { connection })
    }
}

#[async_trait]
impl Queue for RedisQueue {
    async fn push(&self, queue: &str, payload: &[u8]) -> Result<u64, TransportError> {
        let mut connection = self.connection.clone();
        let length: u64 = connection.lpush(queue, payload).await?;
        Ok(length)
    }
}
