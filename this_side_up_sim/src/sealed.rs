// Sealed-space analysis — flood fill from outside the stack.
//
// Partitions every empty cell of the play volume into "unsealed" (reachable
// from outside) and "sealed" (enclosed on all sides by boxes). Sealed
// pockets are the scoring penalty: space the player walled off and can
// never fill.
//
// The fill is a level-synchronous BFS seeded at (0, 0, max_z + 1) — one
// layer past the top of the playable volume, so an "outside" is always
// reachable. The scan volume extends to z = max_z + 1 for the same reason.
// Starting outside and flooding inward guarantees a pocket enclosed on all
// six faces is never visited and thus classified sealed.
//
// Cost is O(volume) per run — ~1000 cells at default dimensions — and it
// runs only on settle events, never per frame. The result is only as good
// as the occupancy data: callers must finish registering a settle before
// recomputing (the sim's settle path does).
//
// See also: `grid.rs` for the occupancy data being scanned, `sim.rs` which
// recomputes after every settle and exposes the counts to scoring.
//
// **Critical constraint: determinism.** The output sets are `BTreeSet`.
// The transient visited set is an `FxHashSet` — fine, because nothing
// observes its iteration order.

use crate::grid::OccupancyGrid;
use crate::types::GridCell;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const FACE_OFFSETS: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// Result of one sealed-space analysis over the extended volume
/// (x, y in [0, width], z in [0, max_z + 1]).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpaceReport {
    /// Empty cells reachable from outside the stack.
    pub unsealed: BTreeSet<GridCell>,
    /// Empty cells enclosed by boxes on every path to the outside.
    pub sealed: BTreeSet<GridCell>,
    /// Unsealed cells inside the playable volume (z <= max_z). This is the
    /// scoring count; it excludes the extended top layer analytically
    /// instead of correcting with a hard-coded constant, so it stays right
    /// if the grid dimensions change.
    pub free_count: usize,
    /// Sealed cells inside the playable volume.
    pub sealed_count: usize,
}

/// Classify every empty cell of the extended volume as sealed or unsealed.
///
/// Invariants on the result: `sealed` and `unsealed` are disjoint, and
/// together with the occupied cells inside the extended volume they cover
/// it exactly. Running twice against unchanged occupancy yields identical
/// reports.
pub fn classify_spaces(grid: &OccupancyGrid) -> SpaceReport {
    let width = grid.width();
    let top = grid.max_z() + 1;

    let mut unsealed = BTreeSet::new();
    let mut visited: FxHashSet<GridCell> = FxHashSet::default();
    let mut frontier: Vec<GridCell> = Vec::new();

    // Seed one cell known to be outside the stack. The seed itself is
    // trivially unsealed. (If the seed were ever occupied the fill finds
    // nothing — that state is only reachable after a game-over settle.)
    let seed = GridCell::new(0, 0, top);
    if !grid.is_occupied(seed) {
        visited.insert(seed);
        unsealed.insert(seed);
        frontier.push(seed);
    }

    // Level-synchronous expansion: drain the current frontier completely,
    // admitting valid unvisited neighbors into the next one.
    while !frontier.is_empty() {
        let mut next = Vec::new();
        for pos in frontier.drain(..) {
            for (dx, dy, dz) in FACE_OFFSETS {
                let neighbor = GridCell::new(pos.x + dx, pos.y + dy, pos.z + dz);
                let inside = neighbor.x >= 0
                    && neighbor.x <= width
                    && neighbor.y >= 0
                    && neighbor.y <= width
                    && neighbor.z >= 0
                    && neighbor.z <= top;
                if inside && !grid.is_occupied(neighbor) && visited.insert(neighbor) {
                    unsealed.insert(neighbor);
                    next.push(neighbor);
                }
            }
        }
        frontier = next;
    }

    // Everything in the extended volume that is neither occupied nor
    // reached from outside is sealed.
    let mut sealed = BTreeSet::new();
    for x in 0..=width {
        for y in 0..=width {
            for z in 0..=top {
                let cell = GridCell::new(x, y, z);
                if !grid.is_occupied(cell) && !unsealed.contains(&cell) {
                    sealed.insert(cell);
                }
            }
        }
    }

    let max_z = grid.max_z();
    let free_count = unsealed.iter().filter(|c| c.z <= max_z).count();
    let sealed_count = sealed.iter().filter(|c| c.z <= max_z).count();

    SpaceReport {
        unsealed,
        sealed,
        free_count,
        sealed_count,
    }
}
