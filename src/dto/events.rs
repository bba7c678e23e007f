//! Events broadcast to every participant of a session, over SSE and WebSocket alike.

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{
    scoring::ScoreResult,
    sequence::{TargetSequence, TargetStep},
    session::ClimberPosition,
    state_machine::FinishReason,
};

/// Every event a session emits. Serialized as `{"type": "<name>", ...payload}`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A player took a slot in the session.
    PlayerJoined(PlayerJoinedEvent),
    /// The second player joined and the first turn can begin.
    GameStart(GameStartEvent),
    /// The active player began their turn.
    TurnStarted(TurnStartedEvent),
    /// A turn was scored.
    TurnResult(TurnResultEvent),
    /// A player left the session.
    OpponentLeft(OpponentLeftEvent),
}

impl SessionEvent {
    /// Event name used on the SSE stream; matches the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::PlayerJoined(_) => "player_joined",
            SessionEvent::GameStart(_) => "game_start",
            SessionEvent::TurnStarted(_) => "turn_started",
            SessionEvent::TurnResult(_) => "turn_result",
            SessionEvent::OpponentLeft(_) => "opponent_left",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast when a player joins.
pub struct PlayerJoinedEvent {
    pub player: String,
    pub player_index: usize,
    pub player_count: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast once both players are present.
pub struct GameStartEvent {
    pub players: Vec<String>,
    pub current_player: String,
    #[schema(value_type = Vec<TargetStep>)]
    pub sequence: TargetSequence,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast when the active player begins; carries the sequence to play.
pub struct TurnStartedEvent {
    pub player: String,
    #[schema(value_type = Vec<TargetStep>)]
    pub sequence: TargetSequence,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast after every completed turn.
pub struct TurnResultEvent {
    /// Player who completed the turn.
    pub player: String,
    pub player_index: usize,
    pub score: ScoreResult,
    /// Cumulative score of `player` after this turn.
    pub total_score: u32,
    /// Cumulative scores of both slots.
    pub scores: Vec<u32>,
    /// Player whose turn is next; absent once the game is over.
    pub next_player: Option<String>,
    /// Sequence for the next turn; absent once the game is over.
    #[schema(value_type = Option<Vec<TargetStep>>)]
    pub sequence: Option<TargetSequence>,
    pub climbers: Vec<ClimberPosition>,
    pub move_count: u32,
    pub turn_count: u32,
    pub is_game_over: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast when a player leaves while someone is still connected.
pub struct OpponentLeftEvent {
    /// Player who left.
    pub player: String,
    /// Player still in the session.
    pub remaining_player: String,
    /// True when the departure ended a running game.
    pub ended_game: bool,
}
