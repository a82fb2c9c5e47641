//! Broker - state cache and reconciliation engine for httpbroker
//!
//! This library turns monitoring alerts pushed in several webhook shapes into
//! canonical Flapjack events, caches the latest status per check and
//! periodically replays that cache into a Redis queue.

pub mod config;
pub mod error;
pub mod event;
pub mod normalize;
pub mod reconciler;
pub mod store;
pub mod transport;

// Re-export main types
pub use config::BrokerConfig;
pub use error::{NormalizeError, StoreError, TransportError, ValidationError};
pub use event::{CachedState, Event};
pub use normalize::{Normalized, Normalizer, PayloadShape};
pub use reconciler::{Reconciler, TickReport};
pub use store::{StateStore, StoreHandle};
pub use transport::{MemoryQueue, Queue, RedisQueue, Transport};

/// Staleness window applied when an inbound state carries `ttl == 0`
pub const DEFAULT_TTL: i64 = 300;

/// Queue the alerting backend consumes events from
pub const DEFAULT_QUEUE: &str = "events";

/// Downstream consumer generation that expects the `_actions` marker
pub const DEFAULT_PROTOCOL_VERSION: u8 = 2;

/// Value stamped into `tags.from_broker` when the sender left it empty
pub const BROKER_TAG: &str = "httpbroker";

/// Current wall-clock time in seconds since the epoch
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
