// Gravity — FIFO settle resolution for committed boxes.
//
// A committed box drops toward the floor one cell at a time until a covered
// cell would land on a settled box or on the floor itself. Exactly one box
// is in flight at any moment: the controller holds a FIFO queue of
// committed boxes and a single active drop. A box leaves the queue only
// after its predecessor has fully settled *and* the grid/sealed-space
// recompute for that settle has run, so every rest resolution sees a
// consistent, previously-settled world.
//
// Rest positions are resolved analytically when a box leaves the queue,
// before any visual motion: first climb out of any overlap with boxes that
// settled while this one waited (the same one-cell stepping the placement
// solver uses), then descend while nothing supports the footprint. A box
// already at rest settles without ever entering `Falling`.
//
// The controller itself owns only queue/active bookkeeping and the pure
// rest-resolution helpers; registering footprints, recomputing sealed
// space, and emitting events is the sim's settle path (`sim.rs`).
//
// See also: `types.rs` for `GravityPhase` (stored on each box entity),
// `grid.rs` for the support queries, `sim.rs` for `advance_gravity`.
//
// **Critical constraint: determinism.** Rest resolution is a pure function
// of occupancy state and the box transform. The fall animation only
// interpolates toward a rest position fixed in advance.

use crate::geom::{self, AlignedBox};
use crate::grid::OccupancyGrid;
use crate::types::{BoxId, GridCell, Rotation, Vec3};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::collections::VecDeque;

/// Extra stepping allowed past the grid height before a rest resolution is
/// declared contradictory.
const STEP_MARGIN: i32 = 8;

/// The box currently interpolating toward its rest position.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct ActiveDrop {
    box_id: BoxId,
    rest: Vec3,
}

/// FIFO drop queue plus the single in-flight box.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GravityController {
    queue: VecDeque<BoxId>,
    active: Option<ActiveDrop>,
}

impl GravityController {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing is queued or falling. Player selection and cursor
    /// movement are gated on this.
    pub fn is_resolved(&self) -> bool {
        self.queue.is_empty() && self.active.is_none()
    }

    pub fn enqueue(&mut self, box_id: BoxId) {
        self.queue.push_back(box_id);
    }

    pub fn pop_queued(&mut self) -> Option<BoxId> {
        self.queue.pop_front()
    }

    pub fn active(&self) -> Option<(BoxId, Vec3)> {
        self.active.map(|drop| (drop.box_id, drop.rest))
    }

    pub fn begin_fall(&mut self, box_id: BoxId, rest: Vec3) {
        self.active = Some(ActiveDrop { box_id, rest });
    }

    pub fn clear_active(&mut self) {
        self.active = None;
    }

    /// Drop all record of a box (entity removed mid-resolution).
    pub fn forget(&mut self, box_id: BoxId) {
        self.queue.retain(|queued| *queued != box_id);
        if self.active.is_some_and(|drop| drop.box_id == box_id) {
            self.active = None;
        }
    }

    pub fn reset(&mut self) {
        self.queue.clear();
        self.active = None;
    }
}

/// Whether a footprint rests on something: any covered cell sits on the
/// floor layer, or directly above a cell occupied by another settled box.
pub fn is_supported(grid: &OccupancyGrid, cells: &BTreeSet<GridCell>, excluding: BoxId) -> bool {
    cells
        .iter()
        .any(|cell| cell.z <= 0 || grid.is_occupied_by_other(cell.below(), excluding))
}

/// Resolve where a committed box comes to rest, without moving it.
///
/// Climbs out of any overlap with settled boxes first (overlap can appear
/// when a box committed while its predecessor was still falling), then
/// descends one cell at a time until supported. Both loops are bounded; a
/// resolution that cannot terminate is a contradiction in the occupancy
/// data, answered by treating the current position as the rest position.
pub fn resolve_rest_position(
    grid: &OccupancyGrid,
    volumes: &[AlignedBox],
    rotation: Rotation,
    from: Vec3,
    excluding: BoxId,
) -> Vec3 {
    if volumes.is_empty() {
        return from;
    }

    let cap = grid.max_z() + STEP_MARGIN;
    let mut position = from;

    let mut climbed = 0;
    loop {
        let blocked = geom::cells_covered(volumes, position, rotation)
            .iter()
            .any(|cell| grid.is_occupied_by_other(*cell, excluding));
        if !blocked {
            break;
        }
        if climbed >= cap {
            warn!("{excluding} found no overlap-free layer within {cap} steps; resting in place");
            return from;
        }
        position.z += 1.0;
        climbed += 1;
    }

    let mut descended = 0;
    loop {
        let cells = geom::cells_covered(volumes, position, rotation);
        if cells.is_empty() || is_supported(grid, &cells, excluding) {
            return position;
        }
        if descended >= position.z as i32 + cap {
            warn!("{excluding} fell past the floor during rest resolution; resting in place");
            return from;
        }
        position.z -= 1.0;
        descended += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_volumes() -> Vec<AlignedBox> {
        vec![AlignedBox::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 1.0),
        )]
    }

    #[test]
    fn unsupported_box_rests_on_the_floor() {
        let grid = OccupancyGrid::new(7, 14);
        let rest = resolve_rest_position(
            &grid,
            &unit_volumes(),
            Rotation::R0,
            Vec3::new(3.0, 3.0, 5.0),
            BoxId(1),
        );
        assert_eq!(rest, Vec3::new(3.0, 3.0, 0.0));
    }

    #[test]
    fn box_rests_on_a_settled_box() {
        let mut grid = OccupancyGrid::new(7, 14);
        grid.mark_occupied([GridCell::new(3, 3, 0)], BoxId(1));
        let rest = resolve_rest_position(
            &grid,
            &unit_volumes(),
            Rotation::R0,
            Vec3::new(3.0, 3.0, 5.0),
            BoxId(2),
        );
        assert_eq!(rest, Vec3::new(3.0, 3.0, 1.0));
    }

    #[test]
    fn box_already_at_rest_stays_put() {
        let grid = OccupancyGrid::new(7, 14);
        let rest = resolve_rest_position(
            &grid,
            &unit_volumes(),
            Rotation::R0,
            Vec3::new(2.0, 2.0, 0.0),
            BoxId(1),
        );
        assert_eq!(rest, Vec3::new(2.0, 2.0, 0.0));
    }

    #[test]
    fn one_supported_cell_is_enough() {
        // A bar with only one of three columns over a settled box still
        // rests on it.
        let mut grid = OccupancyGrid::new(7, 14);
        grid.mark_occupied([GridCell::new(4, 3, 0)], BoxId(1));
        let bar = vec![AlignedBox::new(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(3.0, 1.0, 1.0),
        )];
        let rest = resolve_rest_position(
            &grid,
            &bar,
            Rotation::R0,
            Vec3::new(2.0, 3.0, 6.0),
            BoxId(2),
        );
        assert_eq!(rest, Vec3::new(2.0, 3.0, 1.0));
    }

    #[test]
    fn overlap_is_climbed_out_of_before_descending() {
        // The box starts inside cells another box settled into.
        let mut grid = OccupancyGrid::new(7, 14);
        grid.mark_occupied([GridCell::new(3, 3, 0), GridCell::new(3, 3, 1)], BoxId(1));
        let rest = resolve_rest_position(
            &grid,
            &unit_volumes(),
            Rotation::R0,
            Vec3::new(3.0, 3.0, 0.0),
            BoxId(2),
        );
        assert_eq!(rest, Vec3::new(3.0, 3.0, 2.0));
    }

    #[test]
    fn controller_is_strictly_fifo() {
        let mut gravity = GravityController::new();
        assert!(gravity.is_resolved());
        gravity.enqueue(BoxId(1));
        gravity.enqueue(BoxId(2));
        assert!(!gravity.is_resolved());
        assert_eq!(gravity.pop_queued(), Some(BoxId(1)));
        assert_eq!(gravity.pop_queued(), Some(BoxId(2)));
        assert_eq!(gravity.pop_queued(), None);
    }

    #[test]
    fn forget_removes_queued_and_active() {
        let mut gravity = GravityController::new();
        gravity.enqueue(BoxId(1));
        gravity.begin_fall(BoxId(2), Vec3::new(0.0, 0.0, 0.0));
        gravity.forget(BoxId(1));
        gravity.forget(BoxId(2));
        assert!(gravity.is_resolved());
    }

    #[test]
    fn empty_volumes_rest_where_they_are() {
        let grid = OccupancyGrid::new(7, 14);
        let from = Vec3::new(1.0, 1.0, 9.0);
        assert_eq!(
            resolve_rest_position(&grid, &[], Rotation::R0, from, BoxId(1)),
            from
        );
    }
}
