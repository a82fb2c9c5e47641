//! Periodic replay of the state cache into the Flapjack queue.
//!
//! Every tick takes a snapshot of the store and sends one event per cached
//! state, stamped with the tick time. States silent for longer than their
//! TTL are sent as `UNKNOWN`. One-shot states (`ttl < 0`) are removed after
//! their first send attempt, whether or not it succeeded.

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ReconcilerConfig;
use crate::error::StoreError;
use crate::event::{CachedState, Event};
use crate::store::StoreHandle;
use crate::transport::Transport;
use crate::{BROKER_TAG, unix_now};

/// State sent for entries that outlived their TTL
pub const STALE_STATE: &str = "UNKNOWN";

/// Counters for a single reconciliation tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Entries in the snapshot
    pub cached: usize,
    /// Events accepted by the queue
    pub sent: usize,
    /// Entries sent as `UNKNOWN`
    pub stale: usize,
    /// Events rejected by validation or the queue
    pub failed: usize,
    /// One-shot entries removed
    pub tombstoned: usize,
}

/// Build the event sent for `state` at reconciliation time `now`
pub fn outgoing_event(state: &CachedState, now: i64) -> Event {
    let mut event = state.event.clone();
    event.time = now;

    if let Some(elapsed) = state.stale_for(now) {
        event.state = STALE_STATE.to_string();
        event.summary = format!(
            "{BROKER_TAG}: Cached state is stale ({elapsed}s old, should be < {}s)",
            state.ttl
        );
    }

    event
}

/// Replays cached states on a fixed interval
pub struct Reconciler {
    store: StoreHandle,
    transport: Transport,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(store: StoreHandle, transport: Transport, config: ReconcilerConfig) -> Self {
        Self { store, transport, config }
    }

    /// Run one tick at the current time
    pub async fn tick(&self) -> Result<TickReport, StoreError> {
        self.tick_at(unix_now()).await
    }

    /// Run one tick as if the clock read `now`.
    ///
    /// Sends are sequential; a slow queue delays every entry after it.
    pub async fn tick_at(&self, now: i64) -> Result<TickReport, StoreError> {
        let snapshot = self.store.snapshot().await?;
        let mut report = TickReport { cached: snapshot.len(), ..TickReport::default() };

        for (key, state) in snapshot {
            let event = outgoing_event(&state, now);

            if let Some(elapsed) = state.stale_for(now) {
                report.stale += 1;
                info!(key = %key, elapsed, ttl = state.ttl, "State is stale, sending UNKNOWN");
            }

            if self.config.debug {
                info!(key = %key, state = %event.state, "Sending event");
            }

            match self.transport.send(&event).await {
                Ok(_) => report.sent += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(key = %key, "Failed to send event: {err}");
                }
            }

            if state.is_one_shot() {
                self.store.tombstone(key).await?;
                report.tombstoned += 1;
            }
        }

        Ok(report)
    }

    /// Tick every configured interval until `shutdown` fires.
    ///
    /// A running tick always completes; ticks never overlap.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut timer = interval(self.config.interval());
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval = ?self.config.interval(), "Reconciler started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping reconciler");
                    break;
                }
                _ = timer.tick() => {}
            }

            match self.tick().await {
                Ok(report) => info!(
                    cached = report.cached,
                    sent = report.sent,
                    stale = report.stale,
                    failed = report.failed,
                    tombstoned = report.tombstoned,
                    "Reconciliation tick completed"
                ),
                Err(err) => warn!("Skipping reconciliation tick: {err}"),
            }
        }
    }
}
