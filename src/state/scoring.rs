//! Timing-accuracy scoring for a single turn.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::sequence::{KeyPress, TargetSequence};

/// Upper bounds (exclusive, in milliseconds) and the points they award.
const TIMING_TIERS: [(u64, u32); 4] = [(100, 100), (200, 75), (300, 50), (500, 25)];
/// Points for a correct key pressed 500ms or more away from its mark.
const LATE_KEY_POINTS: u32 = 10;

/// Letter summarising the accuracy of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum Grade {
    /// Accuracy of 95 or above.
    S,
    /// Accuracy of 90 to 94.
    A,
    /// Accuracy of 80 to 89.
    B,
    /// Accuracy of 70 to 79.
    C,
    /// Accuracy of 60 to 69.
    D,
    /// Anything below 60.
    F,
}

impl Grade {
    /// Map an accuracy percentage onto its grade.
    pub fn from_accuracy(accuracy: u8) -> Self {
        match accuracy {
            95.. => Grade::S,
            90..=94 => Grade::A,
            80..=89 => Grade::B,
            70..=79 => Grade::C,
            60..=69 => Grade::D,
            _ => Grade::F,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(letter)
    }
}

/// Outcome of scoring one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScoreResult {
    /// Sum of the per-key tier points.
    pub points: u32,
    /// Rounded percentage of sequence positions hit with the right key.
    pub accuracy: u8,
    /// Number of positions hit with the right key.
    pub correct_keys: usize,
    /// Absolute timing delta per position; `None` for missing or wrong keys.
    pub timing_deltas: Vec<Option<u64>>,
    /// Letter grade derived from `accuracy`.
    pub grade: Grade,
}

/// Points awarded for a correct key pressed `diff_ms` away from its mark.
pub fn tier_points(diff_ms: u64) -> u32 {
    TIMING_TIERS
        .iter()
        .find(|(limit, _)| diff_ms < *limit)
        .map(|(_, points)| *points)
        .unwrap_or(LATE_KEY_POINTS)
}

/// Compare observed presses against the issued sequence.
///
/// Presses are matched by position. Missing positions score nothing and
/// presses past the end of the sequence are ignored.
pub fn score_presses(sequence: &TargetSequence, presses: &[KeyPress]) -> ScoreResult {
    let timing_deltas: Vec<Option<u64>> = sequence
        .steps()
        .iter()
        .enumerate()
        .map(|(index, step)| {
            presses
                .get(index)
                .filter(|press| press.key == step.key)
                .map(|press| press.offset_ms.abs_diff(step.offset_ms))
        })
        .collect();

    let points = timing_deltas.iter().flatten().map(|&d| tier_points(d)).sum();
    let correct_keys = timing_deltas.iter().flatten().count();
    let accuracy = accuracy_percent(correct_keys, sequence.len());

    ScoreResult {
        points,
        accuracy,
        correct_keys,
        timing_deltas,
        grade: Grade::from_accuracy(accuracy),
    }
}

/// Rounded `correct / total * 100`, with an empty sequence reported as 0.
fn accuracy_percent(correct: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let rounded = (correct * 200 + total) / (total * 2);
    rounded.min(100) as u8
}
