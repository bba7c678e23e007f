//! The per-game record: seats, scores, climbers and counters.

use std::time::SystemTime;

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{
    sequence::{KeyPress, TargetSequence},
    state_machine::{SessionPhase, SessionStateMachine},
};

/// Identifier of a session (8 lowercase hexadecimal characters).
pub type SessionId = String;
/// Opaque identifier of a player.
pub type PlayerId = String;

/// Number of players a session holds once it starts.
pub const MAX_PLAYERS: usize = 2;

/// Fixed constants governing climber movement and game length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameRules {
    /// Height every climber starts at (percent from the top of the track).
    pub start_y: u32,
    /// Top of the track; climbers never go past it.
    pub floor_y: u32,
    /// Distance climbed per completed move.
    pub step: u32,
    /// Total moves (both players combined) after which the game ends.
    pub move_cap: u32,
    /// Horizontal lane of each climber.
    pub lanes_x: [u32; MAX_PLAYERS],
}

impl GameRules {
    /// The rule set every session is played with.
    pub const STANDARD: GameRules = GameRules {
        start_y: 90,
        floor_y: 0,
        step: 10,
        move_cap: 10,
        lanes_x: [25, 75],
    };
}

impl Default for GameRules {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Position of a climber on the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ClimberPosition {
    /// Horizontal lane, fixed for the whole game.
    pub x: u32,
    /// Height, decreasing toward the top of the track.
    pub y: u32,
}

/// Mutable state of one two-player game.
#[derive(Debug, Clone)]
pub struct Session {
    pub(super) id: SessionId,
    pub(super) created_at: SystemTime,
    pub(super) rules: GameRules,
    pub(super) machine: SessionStateMachine,
    pub(super) players: [Option<PlayerId>; MAX_PLAYERS],
    pub(super) active_index: usize,
    pub(super) sequence: Option<TargetSequence>,
    pub(super) scores: [u32; MAX_PLAYERS],
    pub(super) climbers: [ClimberPosition; MAX_PLAYERS],
    pub(super) move_count: u32,
    pub(super) turn_count: u32,
    pub(super) presses: Vec<KeyPress>,
}

impl Session {
    /// Build an empty session waiting for players, using [`GameRules::STANDARD`].
    pub fn new(id: SessionId) -> Self {
        Self::with_rules(id, GameRules::STANDARD)
    }

    /// Build an empty session with an explicit rule set.
    pub fn with_rules(id: SessionId, rules: GameRules) -> Self {
        let climbers = rules.lanes_x.map(|x| ClimberPosition {
            x,
            y: rules.start_y,
        });

        Self {
            id,
            created_at: SystemTime::now(),
            rules,
            machine: SessionStateMachine::new(),
            players: Default::default(),
            active_index: 0,
            sequence: None,
            scores: [0; MAX_PLAYERS],
            climbers,
            move_count: 0,
            turn_count: 0,
            presses: Vec::new(),
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Creation time.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    /// Number of phase transitions applied so far.
    pub fn version(&self) -> usize {
        self.machine.version()
    }

    /// True once the game has ended.
    pub fn is_game_over(&self) -> bool {
        self.machine.is_over()
    }

    /// Player slots in join order; a slot is emptied when its player leaves.
    pub fn players(&self) -> &[Option<PlayerId>; MAX_PLAYERS] {
        &self.players
    }

    /// Number of players currently present.
    pub fn player_count(&self) -> usize {
        self.players.iter().flatten().count()
    }

    /// Slot index of `player`, if present.
    pub fn player_index(&self, player: &str) -> Option<usize> {
        self.players
            .iter()
            .position(|slot| slot.as_deref() == Some(player))
    }

    /// Identifier of the player in `index`, if present.
    pub fn player_at(&self, index: usize) -> Option<&PlayerId> {
        self.players.get(index).and_then(Option::as_ref)
    }

    /// Index of the player whose turn it is, only while the game is running.
    pub fn active_index(&self) -> Option<usize> {
        matches!(self.phase(), SessionPhase::InProgress(_)).then_some(self.active_index)
    }

    /// Identifier of the player whose turn it is, only while the game is running.
    pub fn active_player(&self) -> Option<&PlayerId> {
        self.active_index().and_then(|index| self.player_at(index))
    }

    /// Sequence issued for the current turn.
    pub fn sequence(&self) -> Option<&TargetSequence> {
        self.sequence.as_ref()
    }

    /// Cumulative scores per slot.
    pub fn scores(&self) -> [u32; MAX_PLAYERS] {
        self.scores
    }

    /// Climber positions per slot.
    pub fn climbers(&self) -> [ClimberPosition; MAX_PLAYERS] {
        self.climbers
    }

    /// Completed moves by both players.
    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    /// Completed full rounds (one move by each player).
    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    /// Key presses recorded so far in the active turn.
    pub fn recorded_presses(&self) -> &[KeyPress] {
        &self.presses
    }
}
