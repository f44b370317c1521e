// Data-driven game configuration.
//
// All tunable simulation parameters live in `GameConfig`, loadable from
// JSON at startup. The sim never uses magic numbers — it reads from the
// config, so balance iteration needs no recompilation and a presentation
// layer can ship alternate grids or shape tables as data.
//
// See also: `sim.rs` which owns the `GameConfig` as part of `SimState`,
// `catalog.rs` for the default shape table, `score.rs` for the weights.

use crate::catalog::{self, BoxShape};
use crate::score::ScoreWeights;
use serde::{Deserialize, Serialize};

/// All tunable parameters of one game.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameConfig {
    /// Horizontal bound: x and y cell coordinates are valid in
    /// `[0, grid_width]` inclusive.
    pub grid_width: i32,
    /// Depth bound of the playable volume: z valid in `[0, grid_max_z]`.
    /// A box settling past this ends the game.
    pub grid_max_z: i32,
    /// Fall animation speed in cells per second.
    pub fall_speed: f32,
    /// Scoring weights.
    pub score: ScoreWeights,
    /// The spawnable shape table.
    pub shapes: Vec<BoxShape>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid_width: 7,
            grid_max_z: 14,
            fall_speed: 10.0,
            score: ScoreWeights::default(),
            shapes: catalog::standard_shapes(),
        }
    }
}

impl GameConfig {
    /// Load a config from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize this config to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
