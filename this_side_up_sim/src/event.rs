// Simulation events — the sim's output stream.
//
// Every `SimState::step` returns the events it produced, in a documented
// order collaborators can rely on — never on listener registration order
// or any other wiring accident:
//
//   1. Events from commands, in command order.
//   2. Events from gravity advancement, per settle in settle order:
//      `BoxSettled`, then `InvalidPlacementDetected` if the settle ended
//      the game, then `OccupancyRecalculated`, then `GravityQueueDrained`
//      once the last queued box has settled.
//
// `InvalidPlacementDetected` is a first-class terminal game state, not an
// error: the presentation layer owns the game-over sequence and scoring
// finalization it triggers. `InvariantViolated` is the opposite — a
// diagnostic for states the algorithms should never reach, surfaced
// instead of crashing the tick.
//
// See also: `sim.rs` for where each event is emitted, `command.rs` for the
// input half of the interface.

use crate::types::{BoxId, GridCell};
use serde::{Deserialize, Serialize};

/// An event emitted by the simulation during one step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    pub tick: u64,
    pub kind: SimEventKind,
}

/// Everything collaborators can observe happening.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimEventKind {
    /// A new box entity exists, in `Inventory` state.
    BoxSpawned { box_id: BoxId },
    /// A box finished gravity resolution at this grid position.
    /// Scoring, audio, and camera hooks key off this.
    BoxSettled { box_id: BoxId, position: GridCell },
    /// The settled box covers cells outside the legal play volume — the
    /// game-over condition.
    InvalidPlacementDetected { box_id: BoxId },
    /// Occupancy and sealed-space analysis were recomputed; a scoring
    /// snapshot of the new counts.
    OccupancyRecalculated {
        free_spaces: usize,
        sealed_spaces: usize,
        occupied_volume: usize,
    },
    /// The gravity queue emptied; player input is safe to re-enable.
    GravityQueueDrained,
    /// An internal invariant was violated; the box was left at its last
    /// valid position.
    InvariantViolated { box_id: BoxId },
}
