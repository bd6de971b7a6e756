//! Inbound writes from dashboards: tunable overrides and run mode changes.

use robolog::{LiveTable, RunMode};
use robolog_common::{KeyExprBuilder, LiveSample, Value, decode_lenient};
use serde::Deserialize;

use crate::error::{BridgeError, Result};

/// Body of a put on an entry key.
///
/// Dashboards may echo a full sample back or send the bare value.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum InboundPayload {
    Sample(LiveSample),
    Bare(Value),
}

impl InboundPayload {
    pub fn into_value(self) -> Value {
        match self {
            InboundPayload::Sample(sample) => sample.value,
            InboundPayload::Bare(value) => value,
        }
    }
}

/// A decoded inbound put.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// New run mode for the frame loop.
    Mode(RunMode),
    /// New value for a writable entry.
    Write { path: String, value: Value },
}

/// Decode a put on `key`.
///
/// Returns `Ok(None)` for keys the bridge does not accept writes on
/// (foreign prefixes and `@` metadata other than the mode key).
pub fn classify(keys: &KeyExprBuilder, key: &str, payload: &[u8]) -> Result<Option<Inbound>> {
    if key == keys.mode_key() {
        return parse_mode(payload)
            .map(|mode| Some(Inbound::Mode(mode)))
            .map_err(|e| BridgeError::inbound(key, e));
    }

    let Some(path) = keys.strip(key) else {
        return Ok(None);
    };
    let payload: InboundPayload =
        decode_lenient(payload).map_err(|e| BridgeError::inbound(key, e))?;

    Ok(Some(Inbound::Write {
        path: path.to_string(),
        value: payload.into_value(),
    }))
}

/// Parse a run mode sent either as a JSON string or as plain text.
fn parse_mode(payload: &[u8]) -> Result<RunMode> {
    let text = std::str::from_utf8(payload).map_err(|e| BridgeError::Serialization(e.to_string()))?;
    let text = text.trim().trim_matches('"');
    Ok(text.parse::<RunMode>()?)
}

/// Apply a write to the live table.
///
/// Tunables only pick the value up while the loop runs in test mode; in any
/// other mode the next frame restores their initial value.
pub fn apply_write(live: &mut LiveTable, path: &str, value: Value) -> Result<()> {
    live.apply_remote(path, value)
        .map_err(|e| BridgeError::inbound(path, e))?;
    tracing::debug!(path = %path, "Applied inbound write");
    Ok(())
}
