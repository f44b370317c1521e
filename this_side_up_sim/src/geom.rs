// Pure geometry for box footprints.
//
// A box entity carries one or more axis-aligned collider volumes
// (`AlignedBox`), possibly overlapping, in its own local space. This module
// answers the two questions everything else is built on: which grid cells
// does a set of volumes cover at a given transform, and what is the
// absolute min/max extent of those volumes (used by the placement solver's
// clamping shift).
//
// Cell enumeration works the way the collider geometry demands: take the
// eight world-space corners of each volume, reduce them to an axis-aligned
// min/max, then walk unit steps from `min + 0.5` (a point guaranteed to be
// inside the volume at its low corner) up to `max`, rounding each sample to
// the containing cell. Volumes whose extents are not cell-aligned therefore
// floor to the cells that actually contain the sample points.
//
// See also: `placement.rs` and `gravity.rs`, the two consumers that call
// `cells_covered` in their inner loops, `catalog.rs` for the shapes that
// define collider volumes.
//
// Side effects: none. An empty volume list yields an empty cell set and no
// bounds; callers treat that as a no-op case, not an error.

use crate::types::{GridCell, Rotation, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tolerance for the `<= max` test when walking sample points, so that
/// corner values like 3.4999998 from corner arithmetic still count.
const EPS: f32 = 1e-4;

/// One axis-aligned collider volume in a box's local space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignedBox {
    pub center: Vec3,
    pub size: Vec3,
}

impl AlignedBox {
    pub const fn new(center: Vec3, size: Vec3) -> Self {
        Self { center, size }
    }
}

/// Snap a continuous position to the nearest grid cell.
pub fn round_to_grid(p: Vec3) -> GridCell {
    GridCell::new(p.x.round() as i32, p.y.round() as i32, p.z.round() as i32)
}

/// The eight world-space corners of one volume at the given transform.
/// Rotation is applied in local space, then the position is added.
fn world_corners(volume: &AlignedBox, position: Vec3, rotation: Rotation) -> [Vec3; 8] {
    let lo = Vec3::new(
        volume.center.x - volume.size.x * 0.5,
        volume.center.y - volume.size.y * 0.5,
        volume.center.z - volume.size.z * 0.5,
    );
    let hi = Vec3::new(
        volume.center.x + volume.size.x * 0.5,
        volume.center.y + volume.size.y * 0.5,
        volume.center.z + volume.size.z * 0.5,
    );

    let mut corners = [Vec3::new(0.0, 0.0, 0.0); 8];
    let mut i = 0;
    for &x in &[lo.x, hi.x] {
        for &y in &[lo.y, hi.y] {
            for &z in &[lo.z, hi.z] {
                let rotated = rotation.apply(Vec3::new(x, y, z));
                corners[i] = Vec3::new(
                    rotated.x + position.x,
                    rotated.y + position.y,
                    rotated.z + position.z,
                );
                i += 1;
            }
        }
    }
    corners
}

/// Axis-aligned min/max of one volume's world-space corners.
fn volume_bounds(volume: &AlignedBox, position: Vec3, rotation: Rotation) -> (Vec3, Vec3) {
    let corners = world_corners(volume, position, rotation);
    let mut min = corners[0];
    let mut max = corners[0];
    for corner in &corners[1..] {
        min.x = min.x.min(corner.x);
        min.y = min.y.min(corner.y);
        min.z = min.z.min(corner.z);
        max.x = max.x.max(corner.x);
        max.y = max.y.max(corner.y);
        max.z = max.z.max(corner.z);
    }
    (min, max)
}

/// Absolute min/max corner across all supplied volumes at the given
/// transform. `None` when the volume list is empty.
pub fn bounds(volumes: &[AlignedBox], position: Vec3, rotation: Rotation) -> Option<(Vec3, Vec3)> {
    let mut result: Option<(Vec3, Vec3)> = None;
    for volume in volumes {
        let (vmin, vmax) = volume_bounds(volume, position, rotation);
        result = Some(match result {
            None => (vmin, vmax),
            Some((min, max)) => (
                Vec3::new(min.x.min(vmin.x), min.y.min(vmin.y), min.z.min(vmin.z)),
                Vec3::new(max.x.max(vmax.x), max.y.max(vmax.y), max.z.max(vmax.z)),
            ),
        });
    }
    result
}

/// Number of unit sample steps that fit between `lo + 0.5` and `hi` along
/// one axis, as the largest step index (negative means no samples fit).
fn last_step(lo: f32, hi: f32) -> i32 {
    (hi - lo - 0.5 + EPS).floor() as i32
}

/// Every grid cell covered by the volumes at the given transform.
///
/// Overlapping volumes union into one set. The set is ordered (`BTreeSet`)
/// so iteration order is deterministic everywhere it is consumed.
pub fn cells_covered(
    volumes: &[AlignedBox],
    position: Vec3,
    rotation: Rotation,
) -> BTreeSet<GridCell> {
    let mut cells = BTreeSet::new();
    for volume in volumes {
        let (min, max) = volume_bounds(volume, position, rotation);
        for kx in 0..=last_step(min.x, max.x) {
            for ky in 0..=last_step(min.y, max.y) {
                for kz in 0..=last_step(min.z, max.z) {
                    cells.insert(GridCell::new(
                        (min.x + 0.5 + kx as f32).round() as i32,
                        (min.y + 0.5 + ky as f32).round() as i32,
                        (min.z + 0.5 + kz as f32).round() as i32,
                    ));
                }
            }
        }
    }
    cells
}
