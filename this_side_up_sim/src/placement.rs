// Placement solver — from free-floating cursor to valid box position.
//
// Given a box's collider volumes, its rotation, and a desired continuous
// cursor position, produce one corrected position such that:
//
//   1. Every covered cell's (x, y) lies inside the horizontal grid bounds.
//      The correction is a shift computed from how far the absolute min/max
//      corners poke past [0, width] — the minimal move that re-enters the
//      grid, never a recentering. When a volume is wider than the grid the
//      max-side correction wins.
//   2. The depth does not tunnel past the stack: z is clamped to one past
//      the highest settled layer recorded for the cursor's own column. A
//      column nothing has ever settled in imposes no clamp — the box is
//      committed wherever the cursor holds it and gravity brings it down.
//   3. No covered cell collides with a cell occupied by a different settled
//      box: while any does, step one cell deeper (+z) and retest.
//
// The collision loop is bounded by the grid height plus a small margin.
// Exceeding the bound cannot happen with consistent occupancy data, so it
// is treated as an internal invariant violation: log, and hand back the
// input position flagged so the caller keeps the box at its last valid
// spot.
//
// Rotation is applied by the caller before solving, never interleaved with
// the loop. A box with no collider volumes has no footprint to correct —
// the input position comes back unchanged.
//
// See also: `geom.rs` for footprint enumeration, `grid.rs` for the
// occupancy and cache queries, `sim.rs` for the preview/commit flow that
// drives this every tick while a box is being positioned.

use crate::geom::{self, AlignedBox};
use crate::grid::OccupancyGrid;
use crate::types::{BoxId, Rotation, Vec3};
use log::{debug, warn};

/// Extra collision-loop steps allowed past the grid height before the loop
/// is declared stuck.
const STEP_MARGIN: i32 = 8;

/// Outcome of one solver run.
#[derive(Clone, Copy, Debug)]
pub struct PlacementFix {
    /// The corrected position, or the input position when `capped`.
    pub position: Vec3,
    /// True when the collision loop hit its bound — an invariant
    /// violation; the caller should keep the box's last valid position.
    pub capped: bool,
}

/// Resolve a desired cursor position into a clamped, collision-free box
/// position. `excluding` is the box being placed; its own (unsettled)
/// footprint never collides with itself.
pub fn resolve(
    grid: &OccupancyGrid,
    volumes: &[AlignedBox],
    rotation: Rotation,
    cursor: Vec3,
    excluding: BoxId,
) -> PlacementFix {
    let Some((min, max)) = geom::bounds(volumes, cursor, rotation) else {
        debug!("placement requested for {excluding} with no collider volumes");
        return PlacementFix {
            position: cursor,
            capped: false,
        };
    };

    // Horizontal shift back inside [0, width]. Colliders extend half a
    // cell past their outermost cell centers, hence the 0.5 corrections.
    let limit = grid.width() as f32;
    let mut shift_x = 0.0;
    let mut shift_y = 0.0;
    if min.x < 0.0 {
        shift_x = min.x.abs() - 0.5;
    }
    if min.y < 0.0 {
        shift_y = min.y.abs() - 0.5;
    }
    if max.x > limit {
        shift_x = limit - max.x + 0.5;
    }
    if max.y > limit {
        shift_y = limit - max.y + 0.5;
    }

    // Depth clamp from the cursor column's highest-layer record. No z
    // correction comes from the horizontal overflow above, and there is no
    // max-z clamp at all: stepping past the top of the grid is the
    // game-over path, not something to silently prevent here.
    let column = geom::round_to_grid(cursor);
    let next_z = match grid.highest_layer(column.x, column.y) {
        Some(layer) => cursor.z.min((layer + 1) as f32),
        None => cursor.z,
    };

    let mut position = Vec3::new(cursor.x + shift_x, cursor.y + shift_y, next_z);

    // Step deeper until nothing settled is in the way.
    let cap = grid.max_z() + STEP_MARGIN;
    for _ in 0..cap {
        let blocked = geom::cells_covered(volumes, position, rotation)
            .iter()
            .any(|cell| grid.is_occupied_by_other(*cell, excluding));
        if !blocked {
            return PlacementFix {
                position,
                capped: false,
            };
        }
        position.z += 1.0;
    }

    warn!("placement for {excluding} found no free layer within {cap} steps of the cursor");
    PlacementFix {
        position: cursor,
        capped: true,
    }
}
