//! JSON wire schema shared by the connection adapter and the room actor.
//!
//! Frames are UTF-8 JSON, one message per frame. Inbound frames are decoded
//! leniently (coordinates accepted as either a JSON number or a numeric
//! string, mirroring how the original implementation reads them through an
//! intermediate string to avoid float precision loss on large values).
//! Outbound envelopes are internally tagged on `type` so every message
//! carries its own kind alongside its payload.

use goban_core::Cell;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A decoded inbound frame, before coordinate/color validation.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub x: Option<Value>,
    #[serde(default)]
    pub y: Option<Value>,
    #[serde(default)]
    pub color: Option<Value>,
}

/// The dispatch kind of an inbound frame, resolved from its `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    SelectColor,
    GetState,
    Restart,
    Move,
}

impl InboundFrame {
    /// Resolves this frame's dispatch kind. An absent `type`, or the
    /// literal `"move"`, both mean "move".
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        match self.kind.as_deref() {
            Some("select_color") => FrameKind::SelectColor,
            Some("get_state") => FrameKind::GetState,
            Some("restart") => FrameKind::Restart,
            _ => FrameKind::Move,
        }
    }
}

/// Parses a JSON value carrying a coordinate into an `i64`, accepting
/// either a bare JSON number or a numeric string.
#[must_use]
pub fn parse_coordinate(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Parses a JSON value carrying a color selector into a `u8`, accepting
/// either a bare JSON number or a numeric string. The caller is
/// responsible for checking the value against the recognized color set.
#[must_use]
pub fn parse_color_byte(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u8::try_from(v).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Stable, wire-visible rejection reasons. Renamed via serde to the exact
/// snake_case literals the schema promises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    OutOfBounds,
    Occupied,
    InvalidPayload,
    InvalidCoordinate,
    InvalidColor,
    ColorNotSelected,
    MustUseSelectedColor,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| "unknown".to_owned());
        f.write_str(&s)
    }
}

/// Body shared by `move_result` and `color_selected` envelopes.
#[derive(Debug, Clone, Serialize)]
pub struct MoveResultBody {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<Vec<Cell>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<Cell>,
    pub server_seq: u64,
}

impl MoveResultBody {
    #[must_use]
    pub fn rejected(reason: RejectReason, server_seq: u64) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
            removed: None,
            added: None,
            server_seq,
        }
    }

    #[must_use]
    pub fn accepted(removed: Vec<Cell>, added: Option<Cell>, server_seq: u64) -> Self {
        Self {
            accepted: true,
            reason: None,
            removed: (!removed.is_empty()).then_some(removed),
            added,
            server_seq,
        }
    }

    #[must_use]
    pub fn color_selected(server_seq: u64) -> Self {
        Self {
            accepted: true,
            reason: None,
            removed: None,
            added: None,
            server_seq,
        }
    }
}

/// Body of a `delta_update` envelope fanned out to every connection in a
/// room.
#[derive(Debug, Clone, Serialize)]
pub struct DeltaUpdateBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<Vec<Cell>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<Vec<Cell>>,
    pub server_seq: u64,
}

impl DeltaUpdateBody {
    #[must_use]
    pub fn new(added: Option<Cell>, removed: Vec<Cell>, server_seq: u64) -> Self {
        Self {
            added: added.map(|c| vec![c]),
            removed: (!removed.is_empty()).then_some(removed),
            server_seq,
        }
    }
}

/// An outbound message, tagged on `type` so the receiver can dispatch
/// without a second parse pass.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OutboundEnvelope {
    #[serde(rename = "move_result")]
    MoveResult { move_result: MoveResultBody },
    #[serde(rename = "delta_update")]
    DeltaUpdate { delta_update: DeltaUpdateBody },
    #[serde(rename = "color_selected")]
    ColorSelected { move_result: MoveResultBody },
    #[serde(rename = "state")]
    State {
        cells: Vec<Cell>,
        server_seq: u64,
    },
}

impl OutboundEnvelope {
    /// Serializes this envelope to a single JSON frame.
    ///
    /// # Errors
    ///
    /// Returns an error only if the envelope somehow contains non-finite
    /// floats or other values `serde_json` refuses; none of the types in
    /// this crate do, so callers can treat failure as unreachable.
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
