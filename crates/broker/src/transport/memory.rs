//! In-process queue backend (for testing and dry runs)

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Queue;
use crate::error::TransportError;
use crate::event::Event;

/// Named lists kept in memory, newest entry first
#[derive(Debug, Default, Clone)]
pub struct MemoryQueue {
    lists: Arc<RwLock<HashMap<String, VecDeque<Vec<u8>>>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of `queue`, head first
    pub async fn list(&self, queue: &str) -> Vec<Vec<u8>> {
        let lists = self.lists.read().await;
        lists.get(queue).map(|list| list.iter().cloned().collect()).unwrap_or_default()
    }

    /// Events decoded from `queue`, head first; undecodable entries are skipped
    pub async fn events(&self, queue: &str) -> Vec<Event> {
        self.list(queue)
            .await
            .iter()
            .filter_map(|payload| serde_json::from_slice(payload).ok())
            .collect()
    }

    /// Total number of items across every list
    pub async fn writes(&self) -> usize {
        self.lists.read().await.values().map(VecDeque::len).sum()
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    async fn push(&self, queue: &str, payload: &[u8]) -> Result<u64, TransportError> {
        let mut lists = self.lists.write().await;
        let list = lists.entry(queue.to_string()).or_default();
        list.push_front(payload.to_vec());
        Ok(list.len() as u64)
    }
}
