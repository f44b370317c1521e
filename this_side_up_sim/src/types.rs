// Core types shared across the simulation.
//
// Defines the discrete grid coordinate (`GridCell`), the continuous world
// position (`Vec3`), compact box identifiers, and the box lifecycle enums.
// All types derive `Serialize` and `Deserialize` for save/load and for the
// presentation bridge.
//
// Coordinate conventions: x and y span the square cross-section of the play
// volume (`[0, width]` inclusive); z is the depth axis along which boxes
// stack and fall. The floor is at z = 0.
//
// **Critical constraint: determinism.** `GridCell` has a total order so it
// can key `BTreeMap`/`BTreeSet` state; never store grid state in a
// `HashMap`.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A discrete cell address in the play volume. Each component is in cell
/// units; cells are unit cubes centered on integer coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GridCell {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The (x, y) column this cell belongs to.
    pub fn column(self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// The cell one layer closer to the floor.
    pub fn below(self) -> Self {
        Self::new(self.x, self.y, self.z - 1)
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A continuous world-space position, in cell units.
///
/// Cursor positions arrive as `Vec3` and are snapped to `GridCell` by
/// `geom::round_to_grid`. Box origins are `Vec3` so a falling box can sit
/// between layers mid-interpolation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<GridCell> for Vec3 {
    fn from(cell: GridCell) -> Self {
        Self::new(cell.x as f32, cell.y as f32, cell.z as f32)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Entity IDs — simple integers for compactness
// ---------------------------------------------------------------------------

/// Compact identifier for a box entity. Allocated sequentially by the sim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoxId(pub u32);

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoxId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Box lifecycle
// ---------------------------------------------------------------------------

/// Placement lifecycle of a box entity.
///
/// `Inventory -> Placing` when the player selects the box, `Placing ->
/// Placed` on commit. `Placed` is one-way; the only way back to `Placing`
/// does not exist, and `Placing -> Inventory` happens only when a selection
/// is abandoned before commit (which touches no grid state).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoxState {
    /// Waiting in the player's inventory.
    Inventory,
    /// Selected and tracking the cursor.
    Placing,
    /// Committed; gravity resolution owns it from here.
    Placed,
}

/// Gravity phase of a committed box. Transitions are driven exclusively by
/// the gravity controller (see `gravity.rs`); nothing else infers them from
/// flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GravityPhase {
    /// Not committed yet.
    Idle,
    /// Committed and waiting in the FIFO drop queue.
    Queued,
    /// Head of the queue, interpolating toward its rest position.
    Falling,
    /// At rest; footprint registered in the occupancy grid.
    Settled,
}

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// A 90-degree-step rotation about the depth (z) axis.
///
/// Boxes only ever rotate in quarter turns, so rotation is an enum rather
/// than an angle; applying one to a corner point permutes x and y exactly,
/// with no trigonometry and no float drift.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    /// One quarter turn clockwise (viewed from outside the grid, looking
    /// down the z axis).
    pub fn clockwise(self) -> Self {
        match self {
            Self::R0 => Self::R270,
            Self::R90 => Self::R0,
            Self::R180 => Self::R90,
            Self::R270 => Self::R180,
        }
    }

    /// One quarter turn counter-clockwise.
    pub fn counter_clockwise(self) -> Self {
        match self {
            Self::R0 => Self::R90,
            Self::R90 => Self::R180,
            Self::R180 => Self::R270,
            Self::R270 => Self::R0,
        }
    }

    /// Rotate a point about the z axis.
    pub fn apply(self, p: Vec3) -> Vec3 {
        match self {
            Self::R0 => p,
            Self::R90 => Vec3::new(-p.y, p.x, p.z),
            Self::R180 => Vec3::new(-p.x, -p.y, p.z),
            Self::R270 => Vec3::new(p.y, -p.x, p.z),
        }
    }
}
