use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::{SessionPhase, TurnPhase};

/// Publicly visible session phase exposed to clients (REST/SSE/WebSocket).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleSessionPhase {
    /// Waiting for a second player.
    WaitingForPlayers,
    /// Waiting for the active player to begin their turn.
    Idle,
    /// The active player is pressing keys.
    SequenceActive,
    /// The game has ended.
    GameOver,
}

impl From<&SessionPhase> for VisibleSessionPhase {
    fn from(value: &SessionPhase) -> Self {
        match value {
            SessionPhase::WaitingForPlayers => VisibleSessionPhase::WaitingForPlayers,
            SessionPhase::InProgress(TurnPhase::Idle) => VisibleSessionPhase::Idle,
            SessionPhase::InProgress(TurnPhase::SequenceActive { .. }) => {
                VisibleSessionPhase::SequenceActive
            }
            SessionPhase::GameOver(_) => VisibleSessionPhase::GameOver,
        }
    }
}
