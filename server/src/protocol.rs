//! Inbound command envelope parsing
//!
//! The browser sends one JSON object per message. Only three fields matter:
//!
//! ```json
//! { "action": "left", "type": "press", "frameId": "42" }
//! ```
//!
//! Anything else in the object (such as the `HEADERS` map added by the
//! WebSocket extension) is ignored. An envelope may carry an input, a frame
//! acknowledgment, both, or neither.

use serde_json::{Map, Value};
use shared::{Action, Phase};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("envelope is not a JSON object")]
    NotAnObject,
}

/// A parsed inbound message, ready to be queued for the tick task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientCommand {
    pub input: Option<(Action, Phase)>,
    pub frame_ack: Option<u64>,
}

impl ClientCommand {
    /// True when the message carried nothing the simulation understands.
    pub fn is_empty(&self) -> bool {
        self.input.is_none() && self.frame_ack.is_none()
    }
}

/// Parses one inbound text message
///
/// Fails only when the text is not a JSON object. Each field is read on its
/// own: a missing or wrong-typed `action`, `type` or `frameId` leaves the
/// corresponding part of the command empty without affecting the others.
pub fn parse_envelope(text: &str) -> Result<ClientCommand, ProtocolError> {
    let value: Value = serde_json::from_str(text)?;
    let envelope = value.as_object().ok_or(ProtocolError::NotAnObject)?;

    let input = match (text_field(envelope, "action"), text_field(envelope, "type")) {
        (Some(action), Some(kind)) => Action::parse(action).zip(Phase::parse(kind)),
        _ => None,
    };

    let frame_ack = envelope.get("frameId").and_then(parse_frame_id);

    Ok(ClientCommand { input, frame_ack })
}

fn text_field<'a>(envelope: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    envelope.get(key).and_then(Value::as_str)
}

fn parse_frame_id(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}
