// Commands — the sim's input stream.
//
// All external mutation goes through `SimCommand`; the sim is otherwise a
// pure function `(state, commands, dt) -> (new_state, events)`. Commands in
// one step are applied in slice order, before gravity advances.
//
// Selection commands (`TrackCursor`, `RotateBox`, `CommitPlacement`,
// `DeselectBox`) act on the currently selected box — there is at most one,
// because selecting a new box commits the old one first.
// Invalid commands (unknown box, wrong state,
// input while gravity is unresolved) are silent no-ops with a log
// diagnostic; the sim has no way to fail a frame back to the player.
//
// After a game-over settle, every command except `Reset` and `RemoveBox`
// (used by the teardown sequence) is ignored.
//
// See also: `sim.rs` for `apply_command`, `event.rs` for the output half.

use crate::types::{BoxId, Vec3};
use serde::{Deserialize, Serialize};

/// A player- or presentation-issued command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimCommand {
    /// Spawn a box from the shape table: a specific entry, or a PRNG draw
    /// when `shape` is `None`.
    SpawnBox { shape: Option<usize> },
    /// Select an inventory box for placement. Commits the current
    /// selection first, if any. Rejected while gravity is unresolved.
    SelectBox { box_id: BoxId },
    /// Move the selected box toward a cursor position; the placement
    /// solver clamps it. Rejected while gravity is unresolved.
    TrackCursor { position: Vec3 },
    /// Rotate the selected box a quarter turn about the depth axis, then
    /// re-solve at the last tracked cursor. Rejected while gravity is
    /// unresolved.
    RotateBox { clockwise: bool },
    /// Commit the selected box; gravity takes over.
    CommitPlacement,
    /// Abandon the selection. No grid state is touched.
    DeselectBox,
    /// Remove a box entity outright (game-over teardown).
    RemoveBox { box_id: BoxId },
    /// Clear the grid, caches, queue, and all boxes for a new game.
    Reset,
}
