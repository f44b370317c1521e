// this_side_up_sim — pure Rust simulation library.
//
// The placement-and-stacking core of This Side Up, a 3D box-stacking
// puzzle: irregular boxes are positioned with a cursor inside a bounded
// voxel grid, settle under gravity, and wall off "sealed" pockets that
// cost points. This crate contains the whole simulation — occupancy,
// flood-fill classification, placement clamping, gravity — and none of
// the presentation. Rendering, camera/audio ramps, menus, inventory UI,
// and score persistence are external collaborators that feed commands in
// and consume events out; the crate runs and tests headless.
//
// Module overview:
// - `sim.rs`:       Top-level `SimState`, tick loop, command/event processing.
// - `types.rs`:     `GridCell`, `Vec3`, `BoxId`, lifecycle enums, `Rotation`.
// - `geom.rs`:      Collider volumes -> covered cells, bounds, grid snapping.
// - `grid.rs`:      Occupancy set + per-column highest-layer cache.
// - `sealed.rs`:    Flood-fill partition of empty space into sealed/unsealed.
// - `placement.rs`: Cursor -> clamped, collision-free box position.
// - `gravity.rs`:   FIFO drop queue and rest-position resolution.
// - `catalog.rs`:   The spawnable box shape table.
// - `score.rs`:     Scoring counts and weights.
// - `command.rs`:   `SimCommand` — all sim inputs.
// - `event.rs`:     `SimEvent` — all sim outputs, with delivery order.
// - `config.rs`:    `GameConfig` — every tunable, JSON-loadable.
// - `prng.rs`:      Seeded xoshiro256++ — the sim's only randomness.
//
// **Critical constraint: determinism.** The simulation is a pure function:
// `(state, commands, dt) -> (new_state, events)`. All randomness comes
// from the seeded PRNG; stored collections are `BTreeMap`/`BTreeSet`; no
// system time, no OS entropy, no thread state.

pub mod catalog;
pub mod command;
pub mod config;
pub mod event;
pub mod geom;
pub mod gravity;
pub mod grid;
pub mod placement;
pub mod prng;
pub mod score;
pub mod sealed;
pub mod sim;
pub mod types;
