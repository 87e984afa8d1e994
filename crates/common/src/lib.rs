//! Shared types for the voxelsim engine: grid dimensions, logical coordinates,
//! colored voxels and the grid index that linearizes them.
//!
//! # Invariants
//! - Every component linearizes coordinates with [`GridSize::index`].
//! - Voxel arrays are built by iterating [`GridSize::coords`], so a voxel's
//!   stored position always equals the coordinate its index decodes to.

mod grid;
mod types;

pub use grid::GridError;
pub use types::{BLANK, Color, GridSize, SimCoords, Voxel, count_visible, frame_digest};

pub fn crate_info() -> &'static str {
    "voxelsim-common v0.1.0"
}
