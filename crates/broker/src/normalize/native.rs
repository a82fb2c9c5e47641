//! Payloads already shaped like a cached state.

use serde::Deserialize;
use serde_json::Value;

use super::Decoded;
use crate::error::NormalizeError;
use crate::event::CachedState;

/// A non-empty `entity` claims the payload; a field of the wrong type is
/// then a body error rather than a reason to try the other shapes.
pub(super) fn probe(value: &Value) -> Option<Result<Decoded, NormalizeError>> {
    match value.get("entity")? {
        Value::Null => return None,
        Value::String(entity) if entity.is_empty() => return None,
        _ => {}
    }

    Some(CachedState::deserialize(value).map(Decoded::State).map_err(NormalizeError::Json))
}
