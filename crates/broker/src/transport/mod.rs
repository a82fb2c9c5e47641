//! Queue transport for Flapjack events.
//!
//! [`Transport`] validates an event, pushes its JSON onto the head of the
//! event queue and, for protocol version 2 and later, drops a `+` marker onto
//! the companion `<queue>_actions` list that newer Flapjack consumers block on.

mod memory;
mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{QueueConfig, RedisConfig};
use crate::error::TransportError;
use crate::event::Event;

pub use self::memory::MemoryQueue;
pub use self::redis::RedisQueue;

/// Marker pushed onto the actions queue for every event
pub const ACTION_MARKER: &[u8] = b"+";

/// Name of the marker queue paired with `queue_name`
pub fn actions_queue(queue_name: &str) -> String {
    format!("{queue_name}_actions")
}

/// A list-shaped queue backend
#[async_trait]
pub trait Queue: Send + Sync {
    /// Push `payload` onto the head of `queue`, returning the new length
    async fn push(&self, queue: &str, payload: &[u8]) -> Result<u64, TransportError>;
}

/// Sends validated events to a queue backend
#[derive(Clone)]
pub struct Transport {
    queue: Arc<dyn Queue>,
    queue_name: String,
    protocol_version: u8,
}

impl Transport {
    /// Wrap an existing backend, using `config` for the default queue name
    /// and protocol version
    pub fn new(queue: Arc<dyn Queue>, config: &QueueConfig) -> Self {
        Self {
            queue,
            queue_name: config.name.clone(),
            protocol_version: config.protocol_version,
        }
    }

    /// Connect to Redis. Fails immediately if the server cannot be reached.
    pub async fn connect(
        redis_config: &RedisConfig,
        config: &QueueConfig,
    ) -> Result<Self, TransportError> {
        let queue = RedisQueue::connect(redis_config).await?;
        Ok(Self::new(Arc::new(queue), config))
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn protocol_version(&self) -> u8 {
        self.protocol_version
    }

    /// Send to the configured queue with the configured protocol version
    pub async fn send(&self, event: &Event) -> Result<u64, TransportError> {
        self.send_to(event, self.protocol_version, &self.queue_name).await
    }

    /// Validate and push `event` onto `queue_name`.
    ///
    /// Nothing is written when validation fails. Returns the queue length
    /// reported by the event push.
    pub async fn send_to(
        &self,
        event: &Event,
        protocol_version: u8,
        queue_name: &str,
    ) -> Result<u64, TransportError> {
        event.validate()?;

        let data = serde_json::to_vec(event)?;
        let length = self.queue.push(queue_name, &data).await?;

        if protocol_version >= 2 {
            self.queue.push(&actions_queue(queue_name), ACTION_MARKER).await?;
        }

        debug!(queue = queue_name, length, key = %event.key(), "Pushed event");
        Ok(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    fn transport(queue: &Arc<MemoryQueue>, protocol_version: u8) -> Transport {
        let config = QueueConfig { name: "events".into(), protocol_version };
        Transport::new(queue.clone(), &config)
    }

    fn event() -> Event {
        Event::service("web1", "ping", "ok", "fine", 1_700_000_000)
    }

    #[tokio::test]
    async fn test_send_pushes_event_and_marker() {
        let queue = Arc::new(MemoryQueue::new());
        let length = transport(&queue, 2).send(&event()).await.unwrap();

        assert_eq!(length, 1);
        assert_eq!(queue.events("events").await, vec![event()]);
        assert_eq!(queue.list("events_actions").await, vec![b"+".to_vec()]);
    }

    #[tokio::test]
    async fn test_protocol_v1_skips_marker() {
        let queue = Arc::new(MemoryQueue::new());
        transport(&queue, 1).send(&event()).await.unwrap();

        assert_eq!(queue.list("events").await.len(), 1);
        assert!(queue.list("events_actions").await.is_empty());
    }

    #[tokio::test]
    async fn test_send_to_overrides_defaults() {
        let queue = Arc::new(MemoryQueue::new());
        transport(&queue, 1).send_to(&event(), 2, "alerts").await.unwrap();

        assert!(queue.list("events").await.is_empty());
        assert_eq!(queue.list("alerts").await.len(), 1);
        assert_eq!(queue.list("alerts_actions").await.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_event_writes_nothing() {
        let queue = Arc::new(MemoryQueue::new());
        let mut event = event();
        event.summary.clear();

        let err = transport(&queue, 2).send(&event).await.unwrap_err();
        assert!(matches!(err, TransportError::Validation(ValidationError::NoSummary)));
        assert_eq!(queue.writes().await, 0);
    }

    #[tokio::test]
    async fn test_newest_event_is_at_the_head() {
        let queue = Arc::new(MemoryQueue::new());
        let transport = transport(&queue, 2);

        let mut older = event();
        older.summary = "older".into();
        transport.send(&older).await.unwrap();
        let length = transport.send(&event()).await.unwrap();

        assert_eq!(length, 2);
        let events = queue.events("events").await;
        assert_eq!(events[0].summary, "fine");
        assert_eq!(events[1].summary, "older");
    }

    #[test]
    fn test_actions_queue_name() {
        assert_eq!(actions_queue("events"), "events_actions");
    }
}
