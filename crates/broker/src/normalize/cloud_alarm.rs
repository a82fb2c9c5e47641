//! CloudWatch alarms delivered through an SNS HTTP subscription.
//!
//! The SNS envelope wraps the alarm as a JSON string in `Message`. A
//! `SubscriptionConfirmation` envelope carries `SubscribeURL` instead and
//! must be fetched once to activate the subscription.

use serde::Deserialize;
use serde_json::Value;

use super::{Decoded, alarm_state, nullable};
use crate::error::NormalizeError;
use crate::event::{CachedState, Event};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Envelope {
    #[serde(rename = "Message", deserialize_with = "nullable")]
    message: String,
    #[serde(rename = "SigningCertURL", deserialize_with = "nullable")]
    signing_cert_url: String,
    #[serde(rename = "SubscribeURL", deserialize_with = "nullable")]
    subscribe_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Alarm {
    #[serde(deserialize_with = "nullable")]
    alarm_name: String,
    alarm_description: Value,
    #[serde(deserialize_with = "nullable")]
    new_state_reason: String,
    #[serde(deserialize_with = "nullable")]
    new_state_value: String,
    trigger: Trigger,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Trigger {
    #[serde(deserialize_with = "nullable")]
    metric_name: String,
}

impl Alarm {
    fn into_state(self) -> CachedState {
        let details = match self.alarm_description {
            Value::String(description) if !description.is_empty() => Some(description),
            _ => None,
        };

        CachedState::new(
            Event {
                entity: self.alarm_name,
                check: self.trigger.metric_name,
                state: alarm_state(&self.new_state_value).to_string(),
                summary: self.new_state_reason,
                details,
                ..Event::default()
            },
            0,
        )
    }
}

pub(super) fn probe(value: &Value) -> Option<Result<Decoded, NormalizeError>> {
    let envelope = Envelope::deserialize(value).ok()?;
    if envelope.signing_cert_url.is_empty() {
        return None;
    }

    if !envelope.subscribe_url.is_empty() {
        return Some(Ok(Decoded::Confirmation(envelope.subscribe_url)));
    }

    Some(
        serde_json::from_str::<Alarm>(&envelope.message)
            .map(|alarm| Decoded::State(alarm.into_state()))
            .map_err(NormalizeError::AlarmMessage),
    )
}
