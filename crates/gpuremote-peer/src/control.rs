use serde::{Deserialize, Serialize};

use crate::error::Result;

/// CONTROL message type: ping request.
pub const CONTROL_PING: &str = "ping";
/// CONTROL message type: ping response.
pub const CONTROL_PONG: &str = "pong";
/// CONTROL message type: graceful shutdown request.
pub const CONTROL_SHUTDOWN_REQUEST: &str = "shutdown_request";
/// CONTROL message type: graceful shutdown acknowledgement.
pub const CONTROL_SHUTDOWN_ACK: &str = "shutdown_ack";

/// Payload of a frame on the control stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ControlMessage {
    fn bare(msg_type: &str) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            payload: None,
            timestamp: None,
        }
    }

    pub fn ping() -> Self {
        Self::bare(CONTROL_PING)
    }

    pub fn pong() -> Self {
        Self::bare(CONTROL_PONG)
    }

    pub fn shutdown_request(reason: Option<&str>) -> Self {
        Self {
            payload: reason.map(|reason| serde_json::json!({ "reason": reason })),
            ..Self::bare(CONTROL_SHUTDOWN_REQUEST)
        }
    }

    pub fn shutdown_ack() -> Self {
        Self::bare(CONTROL_SHUTDOWN_ACK)
    }

    pub fn is(&self, msg_type: &str) -> bool {
        self.msg_type == msg_type
    }

    /// Shutdown reason, if the sender gave one.
    pub fn reason(&self) -> Option<&str> {
        self.payload.as_ref()?.get("reason")?.as_str()
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_serializes_without_optional_fields() {
        let json = String::from_utf8(ControlMessage::ping().to_json().unwrap()).unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);
    }

    #[test]
    fn shutdown_reason_round_trips() {
        let msg = ControlMessage::shutdown_request(Some("host exiting"));
        let back = ControlMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert!(back.is(CONTROL_SHUTDOWN_REQUEST));
        assert_eq!(back.reason(), Some("host exiting"));
        assert_eq!(ControlMessage::shutdown_ack().reason(), None);
    }

    #[test]
    fn garbage_is_a_json_error() {
        assert!(matches!(
            ControlMessage::from_json(b"{type"),
            Err(crate::PeerError::Json(_))
        ));
    }
}
