// Occupancy grid — the spatial truth for settled boxes.
//
// Owns the set of grid cells covered by settled boxes (keyed by owner so
// collision queries can exclude the box being evaluated) and the
// per-column highest-layer cache that clamps cursor depth during
// placement.
//
// A cell is occupied iff it lies in the footprint of a box that has
// finished gravity settling. Boxes mid-fall are deliberately absent: a
// falling box must be able to pass through cells it will itself occupy,
// and every other box's queries must see previously-settled state only.
//
// The highest-layer cache is monotonic: it only rises as boxes settle and
// only resets with the whole grid. Box removal (game-over teardown)
// rebuilds occupancy but leaves the cache alone, matching its role as a
// "how deep has the player ever stacked here" record rather than a live
// view.
//
// Out-of-bounds queries return "not occupied" / no cache entry; out-of-
// bounds marks are accepted verbatim (an illegally settled box still
// occupies the cells it landed on — the game-over path owns that case).
//
// See also: `sealed.rs` which flood-fills over this grid, `placement.rs`
// and `gravity.rs` for the two query loops, `sim.rs` which owns the one
// instance and drives all mutation.
//
// **Critical constraint: determinism.** Stored state is `BTreeMap` only;
// iteration order is part of the sim's observable behavior.

use crate::types::{BoxId, GridCell};
use std::collections::BTreeMap;

/// Set of occupied cells plus the per-column highest-layer cache.
#[derive(Clone, Debug, Default)]
pub struct OccupancyGrid {
    /// Occupied cells, each with the settled box that covers it. Settled
    /// footprints never overlap, so one owner per cell suffices.
    occupied: BTreeMap<GridCell, BoxId>,
    /// Highest settled z per (x, y) column. Monotonic until `reset`.
    highest_layer: BTreeMap<(i32, i32), i32>,
    /// Horizontal bound: x, y valid in `[0, width]` inclusive.
    width: i32,
    /// Depth bound of the playable volume: z valid in `[0, max_z]`.
    max_z: i32,
}

impl OccupancyGrid {
    pub fn new(width: i32, max_z: i32) -> Self {
        Self {
            occupied: BTreeMap::new(),
            highest_layer: BTreeMap::new(),
            width,
            max_z,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn max_z(&self) -> i32 {
        self.max_z
    }

    /// Whether a cell's (x, y) lies inside the horizontal play bounds.
    pub fn in_horizontal_bounds(&self, cell: GridCell) -> bool {
        cell.x >= 0 && cell.x <= self.width && cell.y >= 0 && cell.y <= self.width
    }

    /// Mark cells as occupied by `owner`. Idempotent; re-marking an
    /// occupied cell keeps the first owner.
    pub fn mark_occupied<I: IntoIterator<Item = GridCell>>(&mut self, cells: I, owner: BoxId) {
        for cell in cells {
            self.occupied.entry(cell).or_insert(owner);
        }
    }

    /// Clear cells. Idempotent; clearing an empty cell is a no-op.
    pub fn clear_occupied<I: IntoIterator<Item = GridCell>>(&mut self, cells: I) {
        for cell in cells {
            self.occupied.remove(&cell);
        }
    }

    pub fn is_occupied(&self, cell: GridCell) -> bool {
        self.occupied.contains_key(&cell)
    }

    /// Whether a cell is occupied by any settled box other than
    /// `excluding`. The pervasive query during placement and gravity.
    pub fn is_occupied_by_other(&self, cell: GridCell, excluding: BoxId) -> bool {
        self.occupied.get(&cell).is_some_and(|owner| *owner != excluding)
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied.len()
    }

    /// Full rebuild from every settled box's footprint: clears the set,
    /// then re-marks. Run after any change to the settled set (a settle, a
    /// removal) so multi-step operations can never leave stale cells.
    pub fn rebuild<'a, I>(&mut self, settled: I)
    where
        I: IntoIterator<Item = (BoxId, &'a [GridCell])>,
    {
        self.occupied.clear();
        for (owner, cells) in settled {
            self.mark_occupied(cells.iter().copied(), owner);
        }
    }

    /// Raise the highest-layer cache for every column a footprint touches.
    /// Never lowers an entry.
    pub fn raise_highest_layer(&mut self, cells: &[GridCell]) {
        for cell in cells {
            let entry = self.highest_layer.entry(cell.column()).or_insert(cell.z);
            if cell.z > *entry {
                *entry = cell.z;
            }
        }
    }

    /// Highest settled z in a column, or `None` if nothing has ever
    /// settled there.
    pub fn highest_layer(&self, x: i32, y: i32) -> Option<i32> {
        self.highest_layer.get(&(x, y)).copied()
    }

    /// Clear everything, including the highest-layer cache. Game restart
    /// only.
    pub fn reset(&mut self) {
        self.occupied.clear();
        self.highest_layer.clear();
    }
}
