//! Pure decode-and-validate logic for inbound frames, kept free of any I/O
//! so it can be exercised directly in tests without a transport.

use goban_core::Color;
use goban_protocol::{parse_color_byte, parse_coordinate, FrameKind, InboundFrame, RejectReason};
use serde_json::Value;

/// Per-connection state the dispatcher needs across frames.
#[derive(Debug, Default)]
pub struct ConnectionState {
    selected_color: Option<Color>,
}

impl ConnectionState {
    #[must_use]
    pub fn selected_color(&self) -> Option<Color> {
        self.selected_color
    }

    pub fn select_color(&mut self, color: Color) {
        self.selected_color = Some(color);
    }
}

/// What the connection adapter should do in response to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    SelectColor(Color),
    GetState,
    Restart,
    Move { x: i64, y: i64, color: Color },
    Reject(RejectReason),
}

/// Decodes and validates one raw frame against the connection's current
/// state. Never touches a room; only classifies what should happen next.
#[must_use]
pub fn dispatch(state: &ConnectionState, raw: &str) -> Dispatch {
    let Ok(frame) = serde_json::from_str::<InboundFrame>(raw) else {
        return Dispatch::Reject(RejectReason::InvalidPayload);
    };

    match frame.kind() {
        FrameKind::SelectColor => match parse_color(frame.color.as_ref()) {
            Some(color) => Dispatch::SelectColor(color),
            None => Dispatch::Reject(RejectReason::InvalidColor),
        },
        FrameKind::GetState => Dispatch::GetState,
        FrameKind::Restart => Dispatch::Restart,
        FrameKind::Move => dispatch_move(state, &frame),
    }
}

fn parse_color(value: Option<&Value>) -> Option<Color> {
    let byte = parse_color_byte(value?)?;
    Color::try_from(byte).ok()
}

fn dispatch_move(state: &ConnectionState, frame: &InboundFrame) -> Dispatch {
    let Some(selected) = state.selected_color() else {
        return Dispatch::Reject(RejectReason::ColorNotSelected);
    };
    let Some(x) = frame.x.as_ref().and_then(parse_coordinate) else {
        return Dispatch::Reject(RejectReason::InvalidCoordinate);
    };
    let Some(y) = frame.y.as_ref().and_then(parse_coordinate) else {
        return Dispatch::Reject(RejectReason::InvalidCoordinate);
    };
    let Some(color) = parse_color(frame.color.as_ref()) else {
        return Dispatch::Reject(RejectReason::InvalidColor);
    };
    if color != selected {
        return Dispatch::Reject(RejectReason::MustUseSelectedColor);
    }
    Dispatch::Move { x, y, color }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_color_out_of_range_is_rejected() {
        let state = ConnectionState::default();
        let out = dispatch(&state, r#"{"type":"select_color","color":7}"#);
        assert_eq!(out, Dispatch::Reject(RejectReason::InvalidColor));
    }

    #[test]
    fn select_color_then_move_with_matching_color_is_accepted() {
        let mut state = ConnectionState::default();
        match dispatch(&state, r#"{"type":"select_color","color":0}"#) {
            Dispatch::SelectColor(color) => state.select_color(color),
            other => panic!("unexpected dispatch: {other:?}"),
        }
        let out = dispatch(&state, r#"{"x":1,"y":2,"color":0}"#);
        assert_eq!(
            out,
            Dispatch::Move {
                x: 1,
                y: 2,
                color: Color::Black
            }
        );
    }

    #[test]
    fn move_before_select_color_is_rejected() {
        let state = ConnectionState::default();
        let out = dispatch(&state, r#"{"x":1,"y":2,"color":0}"#);
        assert_eq!(out, Dispatch::Reject(RejectReason::ColorNotSelected));
    }

    #[test]
    fn move_with_wrong_color_is_rejected() {
        let mut state = ConnectionState::default();
        state.select_color(Color::Black);
        let out = dispatch(&state, r#"{"x":1,"y":2,"color":1}"#);
        assert_eq!(out, Dispatch::Reject(RejectReason::MustUseSelectedColor));
    }

    #[test]
    fn move_with_unparseable_coordinate_is_rejected() {
        let mut state = ConnectionState::default();
        state.select_color(Color::Black);
        let out = dispatch(&state, r#"{"x":"not-a-number","y":2,"color":0}"#);
        assert_eq!(out, Dispatch::Reject(RejectReason::InvalidCoordinate));
    }

    #[test]
    fn malformed_json_is_invalid_payload() {
        let state = ConnectionState::default();
        let out = dispatch(&state, "{not json");
        assert_eq!(out, Dispatch::Reject(RejectReason::InvalidPayload));
    }

    #[test]
    fn get_state_and_restart_dispatch_without_a_selected_color() {
        let state = ConnectionState::default();
        assert_eq!(dispatch(&state, r#"{"type":"get_state"}"#), Dispatch::GetState);
        assert_eq!(dispatch(&state, r#"{"type":"restart"}"#), Dispatch::Restart);
    }
}
