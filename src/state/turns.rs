//! Turn engine: the player-facing transitions of a [`Session`].
//!
//! Every operation either applies completely or returns a [`TurnError`] and
//! leaves the session untouched.

use std::time::Instant;

use thiserror::Error;

use crate::state::{
    scoring::{ScoreResult, score_presses},
    sequence::{KeyPress, KeySymbol, TargetSequence},
    session::{ClimberPosition, MAX_PLAYERS, PlayerId, Session},
    state_machine::{FinishReason, InvalidTransition, PhaseEvent, SessionPhase, TurnPhase},
};

/// Reasons a player action is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    /// The player never joined this session (or already left).
    #[error("player `{0}` is not part of this session")]
    NotAParticipant(PlayerId),
    /// Another player holds the turn.
    #[error("it is not player `{0}`'s turn")]
    NotYourTurn(PlayerId),
    /// Both slots are taken.
    #[error("session already has {MAX_PLAYERS} players")]
    SessionFull,
    /// Every position of the sequence already has a press.
    #[error("key press buffer already holds the full sequence")]
    PressBufferFull,
    /// The action is not allowed in the current phase.
    #[error("action not allowed while {0:?}")]
    WrongPhase(SessionPhase),
    /// The phase machine refused the transition.
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Slot the player occupies.
    pub player_index: usize,
    /// True when this join filled the session and started the game.
    pub started: bool,
    /// True when the player was already part of the session.
    pub rejoined: bool,
}

/// Result of a completed turn, shared by every path that completes one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Player who completed the turn.
    pub player: PlayerId,
    /// Slot of that player.
    pub player_index: usize,
    /// Scoring of the submitted presses.
    pub score: ScoreResult,
    /// Cumulative score of the player after this turn.
    pub total_score: u32,
    /// Player whose turn is next, absent once the game is over.
    pub next_player: Option<PlayerId>,
    /// Sequence issued for the next turn, absent once the game is over.
    pub next_sequence: Option<TargetSequence>,
    /// Both climbers after the move.
    pub climbers: [ClimberPosition; MAX_PLAYERS],
    /// Completed moves so far.
    pub move_count: u32,
    /// Completed rounds so far.
    pub turn_count: u32,
    /// Set when this turn ended the game.
    pub finish_reason: Option<FinishReason>,
}

impl TurnOutcome {
    /// True when this turn ended the game.
    pub fn is_game_over(&self) -> bool {
        self.finish_reason.is_some()
    }
}

/// Result of a player leaving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Slot the player occupied.
    pub player_index: usize,
    /// Player still in the session, if any.
    pub remaining: Option<PlayerId>,
    /// True when this departure ended a running game.
    pub ended_game: bool,
}

impl LeaveOutcome {
    /// True when nobody is left and the session should be dropped.
    pub fn is_empty(&self) -> bool {
        self.remaining.is_none()
    }
}

impl Session {
    /// Add `player` to the session, starting the game when the second slot fills.
    ///
    /// Joining again with an identifier already present succeeds without changes.
    pub fn join(&mut self, player: &str) -> Result<JoinOutcome, TurnError> {
        if let Some(player_index) = self.player_index(player) {
            return Ok(JoinOutcome {
                player_index,
                started: false,
                rejoined: true,
            });
        }

        if self.player_count() >= MAX_PLAYERS {
            return Err(TurnError::SessionFull);
        }
        if self.phase() != SessionPhase::WaitingForPlayers {
            return Err(TurnError::WrongPhase(self.phase()));
        }

        let Some(player_index) = self.players.iter().position(Option::is_none) else {
            return Err(TurnError::SessionFull);
        };

        let started = self.player_count() + 1 == MAX_PLAYERS;
        if started {
            self.machine.apply(PhaseEvent::PlayersReady)?;
            self.active_index = 0;
            self.sequence = Some(TargetSequence::generate());
        }
        self.players[player_index] = Some(player.to_string());

        Ok(JoinOutcome {
            player_index,
            started,
            rejoined: false,
        })
    }

    /// Start the active player's turn at `now`, returning the sequence to play.
    pub fn begin_turn(&mut self, player: &str, now: Instant) -> Result<TargetSequence, TurnError> {
        self.ensure_active(player)?;
        self.machine
            .apply(PhaseEvent::TurnBegan { started_at: now })?;
        self.presses.clear();
        Ok(self.sequence.clone().unwrap_or_default())
    }

    /// Record one key pressed at `now` during an active turn.
    ///
    /// Returns the turn outcome when this press fills the last position.
    pub fn record_key_press(
        &mut self,
        player: &str,
        key: KeySymbol,
        now: Instant,
    ) -> Result<Option<TurnOutcome>, TurnError> {
        let index = self.ensure_active(player)?;
        let SessionPhase::InProgress(TurnPhase::SequenceActive { started_at }) = self.phase()
        else {
            return Err(TurnError::WrongPhase(self.phase()));
        };

        let expected = self.sequence.as_ref().map_or(0, TargetSequence::len);
        if self.presses.len() >= expected {
            return Err(TurnError::PressBufferFull);
        }

        let offset_ms = now.saturating_duration_since(started_at).as_millis() as u64;
        self.presses.push(KeyPress { key, offset_ms });

        if self.presses.len() < expected {
            return Ok(None);
        }

        let presses = std::mem::take(&mut self.presses);
        self.finish_turn(index, &presses).map(Some)
    }

    /// Complete the active player's turn with client-recorded presses.
    pub fn submit_key_presses(
        &mut self,
        player: &str,
        presses: &[KeyPress],
    ) -> Result<TurnOutcome, TurnError> {
        let index = self.ensure_active(player)?;
        self.finish_turn(index, presses)
    }

    /// Remove `player`; a running game is declared over if someone remains.
    pub fn leave(&mut self, player: &str) -> Result<LeaveOutcome, TurnError> {
        let player_index = self
            .player_index(player)
            .ok_or_else(|| TurnError::NotAParticipant(player.to_string()))?;

        let remaining = self.player_at(1 - player_index).cloned();
        let ended_game = remaining.is_some() && matches!(self.phase(), SessionPhase::InProgress(_));
        if ended_game {
            self.machine
                .apply(PhaseEvent::Finish(FinishReason::OpponentLeft))?;
        }

        self.players[player_index] = None;
        self.presses.clear();

        Ok(LeaveOutcome {
            player_index,
            remaining,
            ended_game,
        })
    }

    fn ensure_active(&self, player: &str) -> Result<usize, TurnError> {
        let index = self
            .player_index(player)
            .ok_or_else(|| TurnError::NotAParticipant(player.to_string()))?;

        if !matches!(self.phase(), SessionPhase::InProgress(_)) {
            return Err(TurnError::WrongPhase(self.phase()));
        }
        if index != self.active_index {
            return Err(TurnError::NotYourTurn(player.to_string()));
        }

        Ok(index)
    }

    fn finish_turn(
        &mut self,
        index: usize,
        presses: &[KeyPress],
    ) -> Result<TurnOutcome, TurnError> {
        let score = match &self.sequence {
            Some(sequence) => score_presses(sequence, presses),
            None => score_presses(&TargetSequence::default(), presses),
        };

        let mut climbers = self.climbers;
        let climber = &mut climbers[index];
        climber.y = climber
            .y
            .saturating_sub(self.rules.step)
            .max(self.rules.floor_y);

        let move_count = self.move_count + 1;
        let finish_reason = if climbers.iter().all(|c| c.y <= self.rules.floor_y) {
            Some(FinishReason::SummitReached)
        } else if move_count >= self.rules.move_cap {
            Some(FinishReason::MoveLimitReached)
        } else {
            None
        };

        let event = match finish_reason {
            Some(reason) => PhaseEvent::Finish(reason),
            None => PhaseEvent::SequenceCompleted,
        };
        self.machine.apply(event)?;

        self.scores[index] = self.scores[index].saturating_add(score.points);
        self.climbers = climbers;
        self.move_count = move_count;
        if index == MAX_PLAYERS - 1 {
            self.turn_count += 1;
        }
        self.presses.clear();

        if finish_reason.is_none() {
            self.active_index = (index + 1) % MAX_PLAYERS;
            self.sequence = Some(TargetSequence::generate());
        }

        Ok(TurnOutcome {
            player: self.player_at(index).cloned().unwrap_or_default(),
            player_index: index,
            score,
            total_score: self.scores[index],
            next_player: finish_reason
                .is_none()
                .then(|| self.player_at(self.active_index).cloned())
                .flatten(),
            next_sequence: finish_reason.is_none().then(|| self.sequence.clone()).flatten(),
            climbers: self.climbers,
            move_count: self.move_count,
            turn_count: self.turn_count,
            finish_reason,
        })
    }
}
