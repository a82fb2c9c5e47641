//! Canonical event and cached state records.
//!
//! `Event` is the record pushed onto the Flapjack queue. `CachedState` is an
//! `Event` plus the staleness window the broker keeps it under.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;
use crate::{BROKER_TAG, DEFAULT_TTL};

/// Treat JSON `null` like an absent field
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Tag naming the component that relayed an event
pub const FROM_BROKER_TAG: &str = "from_broker";

/// A Flapjack event as written to the queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    /// Monitored resource the status applies to
    #[serde(deserialize_with = "nullable")]
    pub entity: String,

    /// Sub-check within the entity
    #[serde(deserialize_with = "nullable")]
    pub check: String,

    /// Event category, usually `service`
    #[serde(rename = "type", deserialize_with = "nullable")]
    pub event_type: String,

    /// Status text (`ok`, `critical`, `UNKNOWN`, ...)
    #[serde(deserialize_with = "nullable")]
    pub state: String,

    /// Free-text description
    #[serde(deserialize_with = "nullable")]
    pub summary: String,

    /// Observation time in seconds since the epoch
    #[serde(deserialize_with = "nullable")]
    pub time: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

impl Event {
    /// Create a `service` event stamped with the given time
    pub fn service(
        entity: impl Into<String>,
        check: impl Into<String>,
        state: impl Into<String>,
        summary: impl Into<String>,
        time: i64,
    ) -> Self {
        Self {
            entity: entity.into(),
            check: check.into(),
            event_type: "service".to_string(),
            state: state.into(),
            summary: summary.into(),
            time,
            details: None,
            tags: None,
        }
    }

    /// Attach free-text details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Set a single tag, creating the tag map when needed
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.get_or_insert_with(BTreeMap::new).insert(key.into(), value.into());
        self
    }

    /// Cache key for this event (`entity:check`)
    pub fn key(&self) -> String {
        format!("{}:{}", self.entity, self.check)
    }

    /// Check the fields Flapjack refuses to process when empty
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.entity.is_empty() {
            return Err(ValidationError::NoEntity);
        }
        if self.check.is_empty() {
            return Err(ValidationError::NoCheck);
        }
        if self.state.is_empty() {
            return Err(ValidationError::NoState);
        }
        if self.summary.is_empty() {
            return Err(ValidationError::NoSummary);
        }
        Ok(())
    }
}

/// An event held in the broker cache together with its staleness window.
///
/// `ttl > 0` is the allowed silence in seconds, `ttl < 0` marks a one-shot
/// entry that is emitted once and then dropped. `ttl == 0` only exists before
/// defaults are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedState {
    #[serde(flatten)]
    pub event: Event,

    #[serde(default, deserialize_with = "nullable")]
    pub ttl: i64,
}

impl CachedState {
    pub fn new(event: Event, ttl: i64) -> Self {
        Self { event, ttl }
    }

    pub fn key(&self) -> String {
        self.event.key()
    }

    pub fn is_one_shot(&self) -> bool {
        self.ttl < 0
    }

    /// Seconds elapsed since observation when the entry is stale at `now`.
    ///
    /// One-shot entries never go stale. The boundary is exclusive: an entry
    /// observed exactly `ttl` seconds ago is still fresh.
    pub fn stale_for(&self, now: i64) -> Option<i64> {
        let elapsed = now.saturating_sub(self.event.time);
        (self.ttl >= 0 && elapsed > self.ttl).then_some(elapsed)
    }

    /// Fill in the fields every ingested state must carry
    pub fn apply_defaults(&mut self, now: i64) {
        if self.event.time == 0 {
            self.event.time = now;
        }
        if self.event.event_type.is_empty() {
            self.event.event_type = "service".to_string();
        }
        if self.ttl == 0 {
            self.ttl = DEFAULT_TTL;
        }

        let tags = self.event.tags.get_or_insert_with(BTreeMap::new);
        let from_broker = tags.entry(FROM_BROKER_TAG.to_string()).or_default();
        if from_broker.is_empty() {
            *from_broker = BROKER_TAG.to_string();
        }
    }
}
