// Scoring — counts in, points out.
//
// The sim produces the three counts after every occupancy recompute; the
// arithmetic that turns them into a score lives here so the presentation
// layer and the sim agree on it. Persistence of score history and high
// scores is entirely the presentation layer's business.
//
// Filled space rewards, empty space penalizes, sealed space penalizes
// double — walling off pockets you can never fill is the cardinal sin.

use serde::{Deserialize, Serialize};

/// The three counts a finished (or in-progress) game is scored from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    /// Unsealed empty cells inside the playable volume.
    pub free_spaces: usize,
    /// Sealed empty cells inside the playable volume.
    pub sealed_spaces: usize,
    /// Cells covered by settled boxes.
    pub occupied_volume: usize,
}

/// Per-cell point weights.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub filled_reward: i64,
    pub free_space_penalty: i64,
    pub sealed_space_penalty: i64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            filled_reward: 20,
            free_space_penalty: 5,
            sealed_space_penalty: 10,
        }
    }
}

/// Total score for a snapshot.
pub fn score(weights: ScoreWeights, snapshot: ScoreSnapshot) -> i64 {
    snapshot.occupied_volume as i64 * weights.filled_reward
        - snapshot.free_spaces as i64 * weights.free_space_penalty
        - snapshot.sealed_spaces as i64 * weights.sealed_space_penalty
}
