//! Ingestion normalizer.
//!
//! Inbound payloads arrive without a declared format. The body is parsed as a
//! JSON object once and then offered to each probe in [`PROBES`] order; the
//! first probe whose discriminating field is non-empty decides the shape:
//!
//! 1. native `CachedState` (`entity` set)
//! 2. New Relic alert webhook (`condition_name` set)
//! 3. CloudWatch alarm inside an SNS envelope (`SigningCertURL` set)
//!
//! A payload matching none of them still yields an (almost empty) state so
//! that the failure surfaces as a validation error when it is sent.

mod cloud_alarm;
mod native;
mod new_relic;

use std::fmt;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::NormalizeError;
use crate::event::CachedState;
pub(crate) use crate::event::nullable;
use crate::unix_now;

/// Payload format an inbound state was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    Native,
    NewRelic,
    CloudAlarm,
    Unrecognized,
}

impl fmt::Display for PayloadShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadShape::Native => write!(f, "native"),
            PayloadShape::NewRelic => write!(f, "new_relic"),
            PayloadShape::CloudAlarm => write!(f, "cloud_alarm"),
            PayloadShape::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

/// Outcome of normalizing one payload
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// A state ready to be cached
    State { state: CachedState, shape: PayloadShape },

    /// An SNS subscription handshake; nothing is cached
    Confirmation { url: String },
}

/// What a single probe extracted before defaults are applied
#[derive(Debug)]
pub(crate) enum Decoded {
    State(CachedState),
    Confirmation(String),
}

type Probe = fn(&Value) -> Option<Result<Decoded, NormalizeError>>;

/// Probes in precedence order
const PROBES: [(PayloadShape, Probe); 3] = [
    (PayloadShape::Native, native::probe),
    (PayloadShape::NewRelic, new_relic::probe),
    (PayloadShape::CloudAlarm, cloud_alarm::probe),
];

/// Decode a raw payload, applying the ingestion defaults with `now`
pub fn normalize(raw: &[u8], now: i64) -> Result<Normalized, NormalizeError> {
    let object: Map<String, Value> = serde_json::from_slice(raw)?;
    let value = Value::Object(object);

    let detected = PROBES
        .iter()
        .find_map(|(shape, probe)| probe(&value).map(|decoded| (*shape, decoded)));

    let (shape, mut state) = match detected {
        Some((_, Ok(Decoded::Confirmation(url)))) => {
            return Ok(Normalized::Confirmation { url });
        }
        Some((shape, Ok(Decoded::State(state)))) => (shape, state),
        Some((_, Err(err))) => return Err(err),
        None => (PayloadShape::Unrecognized, CachedState::default()),
    };

    state.apply_defaults(now);
    Ok(Normalized::State { state, shape })
}

/// Map an alarm state onto a Flapjack state
pub(crate) fn alarm_state(value: &str) -> &'static str {
    if value.eq_ignore_ascii_case("alarm") {
        "critical"
    } else {
        "ok"
    }
}

/// Normalizer used by the ingestion endpoint.
///
/// Wraps [`normalize`] and performs the outbound subscription confirmation
/// fetch for SNS handshakes.
pub struct Normalizer {
    client: reqwest::Client,
}

impl Normalizer {
    pub fn new(confirm_timeout: Duration) -> Result<Self, NormalizeError> {
        let client = reqwest::Client::builder()
            .timeout(confirm_timeout)
            .user_agent("httpbroker/0.1")
            .build()
            .map_err(NormalizeError::Client)?;

        Ok(Self { client })
    }

    /// Normalize a payload stamped with the current time
    pub async fn ingest(&self, raw: &[u8]) -> Result<Normalized, NormalizeError> {
        let normalized = normalize(raw, unix_now())?;

        match &normalized {
            Normalized::Confirmation { url } => self.confirm(url).await?,
            Normalized::State { shape: PayloadShape::Unrecognized, .. } => {
                warn!("Payload matched no known format, caching an empty state");
            }
            Normalized::State { .. } => {}
        }

        Ok(normalized)
    }

    async fn confirm(&self, url: &str) -> Result<(), NormalizeError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        info!(url = %url, status = response.status().as_u16(), "Confirmed SNS subscription");
        Ok(())
    }
}
