//! Phase machine shared by every session.

use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// High-level phases a session can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Fewer than two players have joined.
    WaitingForPlayers,
    /// Both players are present and turns are being played.
    InProgress(TurnPhase),
    /// Terminal phase; no further turns are accepted.
    GameOver(FinishReason),
}

/// Sub-phase of a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Waiting for the active player to begin their turn.
    Idle,
    /// The active player is pressing keys against the current sequence.
    SequenceActive {
        /// Moment the turn began; key press offsets are measured from here.
        started_at: Instant,
    },
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Both climbers reached the top of the track.
    SummitReached,
    /// The maximum number of moves has been played.
    MoveLimitReached,
    /// One of the players left the session.
    OpponentLeft,
}

/// Events that can be applied to the phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// The second player joined.
    PlayersReady,
    /// The active player started their turn.
    TurnBegan {
        /// Moment the turn began.
        started_at: Instant,
    },
    /// The active player's presses were scored and play continues.
    SequenceCompleted,
    /// The session ends.
    Finish(FinishReason),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: PhaseEvent,
}

/// Phase machine for a single session.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: SessionPhase,
    version: usize,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            phase: SessionPhase::WaitingForPlayers,
            version: 0,
        }
    }
}

impl SessionStateMachine {
    /// Create a new machine waiting for players.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// True once the terminal phase has been reached.
    pub fn is_over(&self) -> bool {
        matches!(self.phase, SessionPhase::GameOver(_))
    }

    /// Validate and apply `event`, returning the new phase.
    pub fn apply(&mut self, event: PhaseEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }

    fn compute_transition(&self, event: PhaseEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (SessionPhase::WaitingForPlayers, PhaseEvent::PlayersReady) => {
                SessionPhase::InProgress(TurnPhase::Idle)
            }
            (SessionPhase::InProgress(TurnPhase::Idle), PhaseEvent::TurnBegan { started_at }) => {
                SessionPhase::InProgress(TurnPhase::SequenceActive { started_at })
            }
            (SessionPhase::InProgress(_), PhaseEvent::SequenceCompleted) => {
                SessionPhase::InProgress(TurnPhase::Idle)
            }
            (SessionPhase::InProgress(_), PhaseEvent::Finish(reason)) => {
                SessionPhase::GameOver(reason)
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_waiting() {
        let sm = SessionStateMachine::new();
        assert_eq!(sm.phase(), SessionPhase::WaitingForPlayers);
        assert_eq!(sm.version(), 0);
    }

    #[test]
    fn full_happy_path_through_session() {
        let mut sm = SessionStateMachine::new();
        let started_at = Instant::now();

        assert_eq!(
            sm.apply(PhaseEvent::PlayersReady).unwrap(),
            SessionPhase::InProgress(TurnPhase::Idle)
        );
        assert_eq!(
            sm.apply(PhaseEvent::TurnBegan { started_at }).unwrap(),
            SessionPhase::InProgress(TurnPhase::SequenceActive { started_at })
        );
        assert_eq!(
            sm.apply(PhaseEvent::SequenceCompleted).unwrap(),
            SessionPhase::InProgress(TurnPhase::Idle)
        );
        assert_eq!(
            sm.apply(PhaseEvent::Finish(FinishReason::MoveLimitReached))
                .unwrap(),
            SessionPhase::GameOver(FinishReason::MoveLimitReached)
        );
        assert_eq!(sm.version(), 4);
        assert!(sm.is_over());
    }

    #[test]
    fn turn_cannot_begin_twice() {
        let mut sm = SessionStateMachine::new();
        let started_at = Instant::now();
        sm.apply(PhaseEvent::PlayersReady).unwrap();
        sm.apply(PhaseEvent::TurnBegan { started_at }).unwrap();

        let err = sm.apply(PhaseEvent::TurnBegan { started_at }).unwrap_err();
        assert_eq!(err.event, PhaseEvent::TurnBegan { started_at });
        assert_eq!(
            err.from,
            SessionPhase::InProgress(TurnPhase::SequenceActive { started_at })
        );
    }

    #[test]
    fn nothing_leaves_game_over() {
        let mut sm = SessionStateMachine::new();
        sm.apply(PhaseEvent::PlayersReady).unwrap();
        sm.apply(PhaseEvent::Finish(FinishReason::OpponentLeft))
            .unwrap();

        for event in [
            PhaseEvent::PlayersReady,
            PhaseEvent::TurnBegan {
                started_at: Instant::now(),
            },
            PhaseEvent::SequenceCompleted,
            PhaseEvent::Finish(FinishReason::SummitReached),
        ] {
            assert!(sm.apply(event).is_err());
        }
        assert_eq!(
            sm.phase(),
            SessionPhase::GameOver(FinishReason::OpponentLeft)
        );
        assert_eq!(sm.version(), 2);
    }

    #[test]
    fn invalid_transition_returns_error() {
        let mut sm = SessionStateMachine::new();
        let err = sm.apply(PhaseEvent::SequenceCompleted).unwrap_err();
        assert_eq!(err.from, SessionPhase::WaitingForPlayers);
        assert_eq!(err.event, PhaseEvent::SequenceCompleted);
        assert_eq!(sm.version(), 0);
    }
}
