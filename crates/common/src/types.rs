use serde::{Deserialize, Serialize};
use std::fmt;

/// RGBA color, one byte per channel.
pub type Color = [u8; 4];

/// Fully transparent black. Initial color of every voxel.
pub const BLANK: Color = [0, 0, 0, 0];

/// Logical position of a cell: (row, col, stack).
///
/// Signed so that neighbor arithmetic can step outside the grid and be
/// rejected by the index instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SimCoords {
    pub row: i32,
    pub col: i32,
    pub stack: i32,
}

impl SimCoords {
    pub fn new(row: i32, col: i32, stack: i32) -> Self {
        Self { row, col, stack }
    }

    /// Coordinates shifted by the given offsets.
    pub fn offset(self, dr: i32, dc: i32, ds: i32) -> Self {
        Self {
            row: self.row + dr,
            col: self.col + dc,
            stack: self.stack + ds,
        }
    }
}

impl fmt::Display for SimCoords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.row, self.col, self.stack)
    }
}

/// Grid dimensions, fixed for the lifetime of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridSize {
    pub rows: u32,
    pub cols: u32,
    pub stacks: u32,
}

impl GridSize {
    pub fn new(rows: u32, cols: u32, stacks: u32) -> Self {
        Self { rows, cols, stacks }
    }

    /// Number of cells, `rows * cols * stacks`.
    pub fn len(&self) -> usize {
        self.rows as usize * self.cols as usize * self.stacks as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensions as an array in (rows, cols, stacks) order.
    pub fn dims(&self) -> [u32; 3] {
        [self.rows, self.cols, self.stacks]
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.rows, self.cols, self.stacks)
    }
}

/// A single colored cell of the grid.
///
/// `position` is assigned once when the voxel array is built; only `color`
/// changes from step to step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Voxel {
    pub color: Color,
    pub position: SimCoords,
}

impl Voxel {
    pub fn new(position: SimCoords, color: Color) -> Self {
        Self { color, position }
    }
}

/// Number of voxels whose alpha channel exceeds `min_alpha`.
pub fn count_visible(voxels: &[Voxel], min_alpha: u8) -> usize {
    voxels.iter().filter(|v| v.color[3] > min_alpha).count()
}

/// FNV-1a hash over the color bytes of a frame, in array order.
///
/// Used to compare frames produced by different runs (live vs replayed).
pub fn frame_digest(voxels: &[Voxel]) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for voxel in voxels {
        for &b in &voxel.color {
            h ^= b as u64;
            h = h.wrapping_mul(0x0100_0000_01b3);
        }
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_len_is_product_of_dims() {
        assert_eq!(GridSize::new(2, 3, 4).len(), 24);
        assert!(GridSize::new(5, 0, 3).is_empty());
    }

    #[test]
    fn default_voxel_is_blank_at_origin() {
        let v = Voxel::default();
        assert_eq!(v.color, BLANK);
        assert_eq!(v.position, SimCoords::new(0, 0, 0));
    }

    #[test]
    fn count_visible_uses_alpha() {
        let voxels = [
            Voxel::new(SimCoords::new(0, 0, 0), [255, 0, 0, 0]),
            Voxel::new(SimCoords::new(0, 1, 0), [0, 0, 0, 200]),
            Voxel::new(SimCoords::new(1, 0, 0), [0, 0, 0, 101]),
        ];
        assert_eq!(count_visible(&voxels, 100), 2);
        assert_eq!(count_visible(&voxels, 0), 2);
    }

    #[test]
    fn frame_digest_changes_with_color() {
        let mut voxels = vec![Voxel::default(); 8];
        let before = frame_digest(&voxels);
        assert_eq!(before, frame_digest(&voxels));
        voxels[3].color = [1, 2, 3, 4];
        assert_ne!(before, frame_digest(&voxels));
    }

    #[test]
    fn coords_display() {
        assert_eq!(SimCoords::new(1, -2, 3).to_string(), "(1, -2, 3)");
        assert_eq!(GridSize::new(2, 2, 1).to_string(), "2x2x1");
    }
}
