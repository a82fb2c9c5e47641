//! In-memory state store.
//!
//! The `entity:check` → `CachedState` map is owned by a single task running
//! [`StateStore::run`]. Everyone else holds a [`StoreHandle`] and talks to the
//! owner through a bounded command channel, so the map is never read while it
//! is being written.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::IntakeConfig;
use crate::error::StoreError;
use crate::event::CachedState;

/// Point-in-time copy of the cache, ordered by key
pub type Snapshot = BTreeMap<String, CachedState>;

/// Commands processed by the store owner, in arrival order
#[derive(Debug)]
enum StoreCommand {
    Upsert(CachedState),
    Tombstone(String),
    Snapshot(oneshot::Sender<Snapshot>),
}

/// Owner of the cached states
pub struct StateStore {
    states: HashMap<String, CachedState>,
    commands: mpsc::Receiver<StoreCommand>,
}

/// Cloneable handle used to submit commands to the store owner
#[derive(Debug, Clone)]
pub struct StoreHandle {
    commands: mpsc::Sender<StoreCommand>,
    submit_timeout: Duration,
}

impl StateStore {
    /// Create a store and the handle that feeds it
    pub fn new(config: &IntakeConfig) -> (Self, StoreHandle) {
        let (tx, rx) = mpsc::channel(config.buffer.max(1));

        let store = Self { states: HashMap::new(), commands: rx };
        let handle = StoreHandle { commands: tx, submit_timeout: config.submit_timeout() };

        (store, handle)
    }

    /// Process commands until `shutdown` fires or every handle is dropped.
    ///
    /// Returns the final map so the caller can inspect what was cached.
    pub async fn run(mut self, shutdown: CancellationToken) -> HashMap<String, CachedState> {
        info!("State store started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping state store");
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => {
                        debug!("All store handles dropped");
                        break;
                    }
                },
            }
        }

        info!(cached = self.states.len(), "State store stopped");
        self.states
    }

    fn apply(&mut self, command: StoreCommand) {
        match command {
            StoreCommand::Upsert(state) => {
                let key = state.key();
                debug!(key = %key, ttl = state.ttl, "Caching state");
                self.states.insert(key, state);
            }
            StoreCommand::Tombstone(key) => {
                if self.states.remove(&key).is_some() {
                    debug!(key = %key, "Removed state");
                }
            }
            StoreCommand::Snapshot(reply) => {
                let snapshot: Snapshot =
                    self.states.iter().map(|(key, state)| (key.clone(), state.clone())).collect();
                // The requester may have given up; nothing to do then
                let _ = reply.send(snapshot);
            }
        }
    }
}

impl StoreHandle {
    /// Replace the state cached under the state's key.
    ///
    /// Waits at most the configured submit timeout for room in the intake.
    pub async fn upsert(&self, state: CachedState) -> Result<(), StoreError> {
        self.commands
            .send_timeout(StoreCommand::Upsert(state), self.submit_timeout)
            .await
            .map_err(|err| match err {
                SendTimeoutError::Timeout(_) => StoreError::Saturated(self.submit_timeout),
                SendTimeoutError::Closed(_) => StoreError::Closed,
            })
    }

    /// Remove the state cached under `key`, if any
    pub async fn tombstone(&self, key: impl Into<String>) -> Result<(), StoreError> {
        self.commands
            .send(StoreCommand::Tombstone(key.into()))
            .await
            .map_err(|_| StoreError::Closed)
    }

    /// Whether the owner task has stopped accepting commands
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Copy of every cached state, reflecting all commands submitted before it
    pub async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let (reply, response) = oneshot::channel();
        self.commands.send(StoreCommand::Snapshot(reply)).await.map_err(|_| StoreError::Closed)?;
        response.await.map_err(|_| StoreError::Closed)
    }
}
