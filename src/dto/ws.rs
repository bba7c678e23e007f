use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dto::session::{JoinSessionResponse, KeyPressAck},
    state::sequence::{KeyPress, KeySymbol},
};

#[derive(Debug, Deserialize, ToSchema)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerInboundMessage {
    /// Create a session and join it.
    CreateSession,
    /// Join an existing session.
    JoinSession { session_id: String },
    /// Begin the turn held by this connection's player.
    BeginTurn,
    /// Record one key, timed by the server.
    KeyPress { key: KeySymbol },
    /// Submit client-timed presses for the current turn.
    SubmitKeyPresses { presses: Vec<KeyPress> },
    /// Leave the joined session.
    LeaveSession,
    #[serde(other)]
    Unknown,
}

impl PlayerInboundMessage {
    /// Parse a text frame.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Messages pushed to player WebSocket clients, besides session events.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerOutboundMessage {
    /// Sent once on connection with the identifier assigned to this socket.
    Connected { player_id: String },
    /// A session was created on behalf of this connection.
    SessionCreated { session_id: String },
    /// The connection joined a session.
    SessionJoined(JoinSessionResponse),
    /// The session already holds two players.
    SessionFull { session_id: String },
    /// A server-timed key press was recorded.
    KeyPressAck(KeyPressAck),
    /// A request was rejected.
    Error { message: String },
}

impl PlayerOutboundMessage {
    /// Shorthand for an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_messages_use_snake_case_tags() {
        let msg = PlayerInboundMessage::from_json_str(
            r#"{"type":"join_session","session_id":"deadbeef"}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            PlayerInboundMessage::JoinSession { ref session_id } if session_id == "deadbeef"
        ));

        let msg = PlayerInboundMessage::from_json_str(r#"{"type":"key_press","key":"D"}"#).unwrap();
        assert!(matches!(msg, PlayerInboundMessage::KeyPress { key: KeySymbol::D }));

        let msg = PlayerInboundMessage::from_json_str(r#"{"type":"dance"}"#).unwrap();
        assert!(matches!(msg, PlayerInboundMessage::Unknown));
    }

    #[test]
    fn outbound_messages_are_tagged() {
        let json = serde_json::to_value(PlayerOutboundMessage::error("nope")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "nope");

        let ack = PlayerOutboundMessage::KeyPressAck(KeyPressAck {
            accepted: true,
            recorded: 2,
            completed: false,
        });
        let json = serde_json::to_value(ack).unwrap();
        assert_eq!(json["type"], "key_press_ack");
        assert_eq!(json["recorded"], 2);
    }
}
