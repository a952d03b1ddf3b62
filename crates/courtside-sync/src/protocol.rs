//! Inbound frame normalization.
//!
//! The match server has emitted the same logical update in two shapes:
//!
//! ```text
//! direct:  { "type": "match_state",  "match_state": { "match_id": .., .. } }
//! wrapped: { "type": "match_update", "match_id": .., "data": { "match_state": { .. } } }
//! ```
//!
//! Both are kept as first-class variants until the server settles on one.
//! Any other `type` is a message kind this client does not know yet and is
//! ignored rather than reported.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::ParseError;
use crate::model::{MatchStatus, MatchUpdate};

/// `type` of the direct shape.
pub const MATCH_STATE: &str = "match_state";
/// `type` of the wrapped shape.
pub const MATCH_UPDATE: &str = "match_update";

/// Parsed subset of a `match_state` object.
#[derive(Debug, Deserialize)]
struct RawMatchState {
    #[serde(default)]
    match_id: Option<String>,
    #[serde(default)]
    status: Option<MatchStatus>,
    #[serde(default)]
    current_set: Option<u32>,
    #[serde(default)]
    score_a: Option<u32>,
    #[serde(default)]
    score_b: Option<u32>,
    #[serde(default)]
    rotation_a: Option<u8>,
    #[serde(default)]
    rotation_b: Option<u8>,
    #[serde(default)]
    changes: Option<Vec<String>>,
}

/// Maps one raw text frame to a canonical update.
///
/// Returns `Ok(None)` for frames that are well formed but carry nothing to
/// merge (unknown `type`, or a known `type` without its inner state). Does not
/// touch any shared state.
pub fn normalize(raw: &str) -> Result<Option<MatchUpdate>, ParseError> {
    let frame: Value = serde_json::from_str(raw)?;
    let Value::Object(frame) = frame else {
        return Err(ParseError::NotAnObject);
    };
    let kind = frame
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingType)?;

    match kind {
        MATCH_STATE => from_state(frame.get(MATCH_STATE), None),
        MATCH_UPDATE => {
            let outer_id = frame.get("match_id").and_then(Value::as_str);
            from_state(wrapped_state(&frame), outer_id)
        }
        other => {
            trace!(kind = other, "ignoring unrecognised frame type");
            Ok(None)
        }
    }
}

fn wrapped_state(frame: &Map<String, Value>) -> Option<&Value> {
    frame.get("data")?.as_object()?.get(MATCH_STATE)
}

fn from_state(
    state: Option<&Value>,
    fallback_id: Option<&str>,
) -> Result<Option<MatchUpdate>, ParseError> {
    let Some(state) = state.filter(|value| !value.is_null()) else {
        return Ok(None);
    };
    let raw = RawMatchState::deserialize(state)?;
    let match_id = raw
        .match_id
        .or_else(|| fallback_id.map(str::to_owned))
        .ok_or(ParseError::MissingMatchId)?;

    Ok(Some(MatchUpdate {
        match_id,
        status: raw.status,
        current_set: raw.current_set,
        score_a: raw.score_a,
        score_b: raw.score_b,
        rotation_a: raw.rotation_a,
        rotation_b: raw.rotation_b,
        changes: raw.changes.map(|c| c.into_iter().collect::<BTreeSet<_>>()),
    }))
}
