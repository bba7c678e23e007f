//! Target sequences issued to the active player each turn.

use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Number of steps in every issued target sequence.
pub const SEQUENCE_LENGTH: usize = 5;
/// Spacing between two consecutive expected offsets.
pub const STEP_INTERVAL_MS: u64 = 1_000;

/// Keys a player can be asked to press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum KeySymbol {
    /// Leftmost lane.
    A,
    /// Second lane.
    S,
    /// Middle lane.
    D,
    /// Fourth lane.
    F,
    /// Rightmost lane.
    G,
}

impl KeySymbol {
    /// Every key of the alphabet, in lane order.
    pub const ALL: [KeySymbol; 5] = [
        KeySymbol::A,
        KeySymbol::S,
        KeySymbol::D,
        KeySymbol::F,
        KeySymbol::G,
    ];
}

/// One expected key and the moment (relative to the turn start) it should be pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TargetStep {
    /// Key the player must press.
    pub key: KeySymbol,
    /// Expected offset from the turn start, in milliseconds.
    pub offset_ms: u64,
}

/// A key observed during a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct KeyPress {
    /// Key the player pressed.
    pub key: KeySymbol,
    /// Observed offset from the turn start, in milliseconds.
    pub offset_ms: u64,
}

/// Ordered list of steps issued to both players for a single turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetSequence {
    steps: Vec<TargetStep>,
}

impl TargetSequence {
    /// Wrap an explicit list of steps.
    pub fn new(steps: Vec<TargetStep>) -> Self {
        Self { steps }
    }

    /// Draw a fresh sequence from the thread-local RNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    /// Draw a fresh sequence: independent uniform keys on a fixed one-second ladder.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let steps = (0..SEQUENCE_LENGTH)
            .map(|index| TargetStep {
                key: KeySymbol::ALL[rng.random_range(0..KeySymbol::ALL.len())],
                offset_ms: index as u64 * STEP_INTERVAL_MS,
            })
            .collect();
        Self { steps }
    }

    /// Steps in issue order.
    pub fn steps(&self) -> &[TargetStep] {
        &self.steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when the sequence has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Presses that would hit every step at exactly the expected time.
    #[cfg(test)]
    pub(crate) fn perfect_presses(&self) -> Vec<KeyPress> {
        self.steps
            .iter()
            .map(|step| KeyPress {
                key: step.key,
                offset_ms: step.offset_ms,
            })
            .collect()
    }
}
