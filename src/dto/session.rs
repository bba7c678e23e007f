//! Request and response bodies of the session REST API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{
        format_system_time,
        phase::VisibleSessionPhase,
        validation::validate_player_id,
    },
    state::{
        sequence::{KeyPress, KeySymbol, TargetStep},
        session::{ClimberPosition, Session},
        state_machine::{FinishReason, SessionPhase},
    },
};

/// Returned once a session has been created.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Body of a join request. A player id is generated when omitted.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct JoinSessionRequest {
    #[serde(default)]
    pub player_id: Option<String>,
}

impl Validate for JoinSessionRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(ref id) = self.player_id {
            if let Err(e) = validate_player_id(id) {
                errors.add("player_id", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Outcome of a successful join.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JoinSessionResponse {
    pub success: bool,
    pub session_id: String,
    pub player_id: String,
    /// Slot of the player (0 or 1).
    pub player_index: usize,
    /// True when the game is running and this player holds the turn.
    pub is_your_turn: bool,
}

/// Body identifying the acting player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PlayerRequest {
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
}

/// Presses recorded client-side, relative to the moment the turn began.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitKeyPressesRequest {
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
    /// At most 64 presses are accepted in one submission.
    #[validate(length(max = 64, message = "at most 64 presses may be submitted"))]
    pub presses: Vec<KeyPress>,
}

/// A single key pressed now; the server measures its offset.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct KeyPressRequest {
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
    pub key: KeySymbol,
}

/// Acknowledgement of a server-timed key press.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct KeyPressAck {
    pub accepted: bool,
    /// Presses recorded so far in the current turn.
    pub recorded: usize,
    /// True when this press completed the turn.
    pub completed: bool,
}

/// Generic acknowledgement for player actions.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub success: bool,
}

impl ActionResponse {
    /// Successful acknowledgement.
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Full view of a session, mainly for debugging and late joiners.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionSummary {
    pub id: String,
    pub created_at: String,
    pub phase: VisibleSessionPhase,
    /// Number of phase transitions applied so far.
    pub version: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Player slots; `null` once a player left.
    pub players: Vec<Option<String>>,
    pub current_player: Option<String>,
    #[schema(value_type = Option<Vec<TargetStep>>)]
    pub sequence: Option<Vec<TargetStep>>,
    pub scores: Vec<u32>,
    pub climbers: Vec<ClimberPosition>,
    pub move_count: u32,
    pub turn_count: u32,
    pub is_game_over: bool,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        let phase = session.phase();
        let finish_reason = match phase {
            SessionPhase::GameOver(reason) => Some(reason),
            _ => None,
        };

        Self {
            id: session.id().to_string(),
            created_at: format_system_time(session.created_at()),
            phase: (&phase).into(),
            version: session.version(),
            finish_reason,
            players: session.players().to_vec(),
            current_player: session.active_player().cloned(),
            sequence: session.sequence().map(|s| s.steps().to_vec()),
            scores: session.scores().to_vec(),
            climbers: session.climbers().to_vec(),
            move_count: session.move_count(),
            turn_count: session.turn_count(),
            is_game_over: session.is_game_over(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::validation::MAX_PLAYER_ID_LENGTH;

    fn presses(count: usize) -> Vec<KeyPress> {
        (0..count)
            .map(|i| KeyPress {
                key: KeySymbol::A,
                offset_ms: i as u64 * 10,
            })
            .collect()
    }

    #[test]
    fn submission_is_capped_at_sixty_four_presses() {
        let at_limit = SubmitKeyPressesRequest {
            player_id: "p1".into(),
            presses: presses(64),
        };
        assert!(at_limit.validate().is_ok());

        let over = SubmitKeyPressesRequest {
            player_id: "p1".into(),
            presses: presses(65),
        };
        let errors = over.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("presses"));
    }

    #[test]
    fn player_id_rules_apply_to_every_request() {
        let long_id = "x".repeat(MAX_PLAYER_ID_LENGTH + 1);

        let errors = PlayerRequest {
            player_id: long_id.clone(),
        }
        .validate()
        .unwrap_err();
        assert!(errors.field_errors().contains_key("player_id"));

        let errors = KeyPressRequest {
            player_id: " ".into(),
            key: KeySymbol::S,
        }
        .validate()
        .unwrap_err();
        assert!(errors.field_errors().contains_key("player_id"));

        let errors = JoinSessionRequest {
            player_id: Some(long_id),
        }
        .validate()
        .unwrap_err();
        assert!(errors.field_errors().contains_key("player_id"));
        assert!(JoinSessionRequest::default().validate().is_ok());
    }
}
