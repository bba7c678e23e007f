use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::dto::events::SessionEvent;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

impl TryFrom<&SessionEvent> for ServerEvent {
    type Error = serde_json::Error;

    fn try_from(value: &SessionEvent) -> Result<Self, Self::Error> {
        Self::json(Some(value.name().to_string()), value)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    pub session_id: String,
    pub player_id: String,
    /// RFC 3339 timestamp of the connection.
    pub timestamp: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
/// Query string of the session SSE stream.
pub struct StreamQuery {
    /// Player subscribing to the stream; only used to tag logs and the handshake.
    pub player_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::events::{OpponentLeftEvent, SessionEvent};

    #[test]
    fn session_events_are_named_after_their_tag() {
        let event = SessionEvent::OpponentLeft(OpponentLeftEvent {
            player: "p1".into(),
            remaining_player: "p2".into(),
            ended_game: true,
        });
        let payload = ServerEvent::try_from(&event).unwrap();

        assert_eq!(payload.event.as_deref(), Some("opponent_left"));
        let data: serde_json::Value = serde_json::from_str(&payload.data).unwrap();
        assert_eq!(data["type"], "opponent_left");
        assert_eq!(data["remaining_player"], "p2");
    }
}
