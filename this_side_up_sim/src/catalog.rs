// Box shape catalog — the data table the spawner draws from.
//
// Each shape is a name plus the collider volumes that define its footprint,
// in the shape's local space with the origin on a cell center. Shapes with
// concave outlines (the elbow, the tee) use two volumes; volumes may
// overlap freely since footprints union.
//
// The spawner draws uniformly from this table via the sim PRNG. The table
// lives in `GameConfig` so presentation layers can ship their own shape
// sets without touching sim code.
//
// See also: `geom.rs` for how volumes become footprints, `config.rs` which
// embeds the default table, `sim.rs` for the spawn command.

use crate::geom::AlignedBox;
use crate::types::Vec3;
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};

/// One spawnable box shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoxShape {
    pub name: String,
    /// Collider volumes in local space. Almost always 1–2, never many.
    pub colliders: SmallVec<[AlignedBox; 4]>,
}

impl BoxShape {
    fn new(name: &str, colliders: SmallVec<[AlignedBox; 4]>) -> Self {
        Self {
            name: name.to_owned(),
            colliders,
        }
    }
}

fn volume(cx: f32, cy: f32, cz: f32, sx: f32, sy: f32, sz: f32) -> AlignedBox {
    AlignedBox::new(Vec3::new(cx, cy, cz), Vec3::new(sx, sy, sz))
}

/// The stock shape set: simple rectangular cartons plus two concave
/// shapes that make tight packing interesting.
pub fn standard_shapes() -> Vec<BoxShape> {
    vec![
        BoxShape::new("cube", smallvec![volume(0.0, 0.0, 0.0, 1.0, 1.0, 1.0)]),
        BoxShape::new("loaf", smallvec![volume(0.5, 0.0, 0.0, 2.0, 1.0, 1.0)]),
        BoxShape::new("plank", smallvec![volume(1.0, 0.0, 0.0, 3.0, 1.0, 1.0)]),
        BoxShape::new("pallet", smallvec![volume(0.5, 0.5, 0.0, 2.0, 2.0, 1.0)]),
        BoxShape::new("crate", smallvec![volume(0.5, 0.5, 0.5, 2.0, 2.0, 2.0)]),
        BoxShape::new("tandem", smallvec![volume(0.0, 0.0, 0.5, 1.0, 1.0, 2.0)]),
        BoxShape::new(
            "elbow",
            smallvec![
                volume(1.0, 0.0, 0.0, 3.0, 1.0, 1.0),
                volume(0.0, 1.0, 0.0, 1.0, 1.0, 1.0),
            ],
        ),
        BoxShape::new(
            "tee",
            smallvec![
                volume(1.0, 0.0, 0.0, 3.0, 1.0, 1.0),
                volume(1.0, 1.0, 0.0, 1.0, 1.0, 1.0),
            ],
        ),
    ]
}
