//! New Relic alert webhooks.

use serde::Deserialize;
use serde_json::Value;

use super::{Decoded, alarm_state, nullable};
use crate::error::NormalizeError;
use crate::event::{CachedState, Event};

/// The subset of the New Relic webhook body the broker reads
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Alert {
    #[serde(deserialize_with = "nullable")]
    policy_name: String,
    #[serde(deserialize_with = "nullable")]
    condition_name: String,
    #[serde(deserialize_with = "nullable")]
    current_state: String,
    #[serde(deserialize_with = "nullable")]
    details: String,
    #[serde(deserialize_with = "nullable")]
    incident_acknowledge_url: String,
    #[serde(deserialize_with = "nullable")]
    incident_url: String,
}

impl Alert {
    fn summary(&self) -> String {
        if self.incident_acknowledge_url.is_empty() {
            self.details.clone()
        } else {
            format!("{} (acknowledge: {})", self.details, self.incident_acknowledge_url)
        }
    }

    fn into_state(self) -> CachedState {
        let summary = self.summary();
        let details = (!self.incident_url.is_empty()).then_some(self.incident_url);

        CachedState::new(
            Event {
                entity: self.policy_name,
                check: self.condition_name,
                state: alarm_state(&self.current_state).to_string(),
                summary,
                details,
                ..Event::default()
            },
            0,
        )
    }
}

pub(super) fn probe(value: &Value) -> Option<Result<Decoded, NormalizeError>> {
    let alert = Alert::deserialize(value).ok()?;
    if alert.condition_name.is_empty() {
        return None;
    }
    Some(Ok(Decoded::State(alert.into_state())))
}
