//! Grid index: the single linearization shared by every component.
//!
//! `index = stack * (rows * cols) + row * cols + col`
//!
//! Invalid coordinates are a hard error. There is no wraparound and no
//! clamping.

use crate::types::{GridSize, SimCoords};

/// Errors from grid index arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("coordinate {coords} is outside grid {grid}")]
    OutOfRange { coords: SimCoords, grid: GridSize },
    #[error("index {index} is outside grid {grid} ({} cells)", grid.len())]
    IndexOutOfRange { index: usize, grid: GridSize },
    #[error("grid {grid} has too many cells to address")]
    TooLarge { grid: GridSize },
}

impl GridSize {
    /// Whether every coordinate lies in `[0, dim)`.
    pub fn contains(&self, coords: SimCoords) -> bool {
        (0..self.rows as i64).contains(&(coords.row as i64))
            && (0..self.cols as i64).contains(&(coords.col as i64))
            && (0..self.stacks as i64).contains(&(coords.stack as i64))
    }

    /// Linear voxel-array offset of `coords`.
    pub fn index(&self, coords: SimCoords) -> Result<usize, GridError> {
        if !self.contains(coords) {
            return Err(GridError::OutOfRange {
                coords,
                grid: *self,
            });
        }
        Ok(self.index_unchecked(coords))
    }

    /// Convenience form of [`GridSize::index`] taking separate coordinates.
    pub fn index_of(&self, row: i32, col: i32, stack: i32) -> Result<usize, GridError> {
        self.index(SimCoords::new(row, col, stack))
    }

    /// Inverse of [`GridSize::index`].
    pub fn coords_from_index(&self, index: usize) -> Result<SimCoords, GridError> {
        if index >= self.len() {
            return Err(GridError::IndexOutOfRange { index, grid: *self });
        }
        Ok(self.coords_unchecked(index))
    }

    /// Number of cells, failing if the product does not fit in `usize`.
    pub fn checked_len(&self) -> Result<usize, GridError> {
        (self.rows as usize)
            .checked_mul(self.cols as usize)
            .and_then(|n| n.checked_mul(self.stacks as usize))
            .ok_or(GridError::TooLarge { grid: *self })
    }

    /// A vector holding one `value` per cell. Allocation failure is reported
    /// as [`GridError::TooLarge`] rather than aborting.
    pub fn filled<T: Clone>(&self, value: T) -> Result<Vec<T>, GridError> {
        let len = self.checked_len()?;
        let mut cells = Vec::new();
        cells
            .try_reserve_exact(len)
            .map_err(|_| GridError::TooLarge { grid: *self })?;
        cells.resize(len, value);
        Ok(cells)
    }

    /// All coordinates in canonical order: stack outer, row, col inner.
    ///
    /// The n-th item is the coordinate whose index is n.
    pub fn coords(self) -> impl Iterator<Item = SimCoords> {
        (0..self.len()).map(move |i| self.coords_unchecked(i))
    }

    /// In-bounds neighbors of `coords` over the 26-cell Moore neighborhood.
    pub fn moore_neighbours(self, coords: SimCoords) -> impl Iterator<Item = SimCoords> {
        MOORE_OFFSETS
            .iter()
            .map(move |&(dr, dc, ds)| coords.offset(dr, dc, ds))
            .filter(move |c| self.contains(*c))
    }

    fn index_unchecked(&self, coords: SimCoords) -> usize {
        let plane = self.rows as usize * self.cols as usize;
        coords.stack as usize * plane + coords.row as usize * self.cols as usize + coords.col as usize
    }

    fn coords_unchecked(&self, index: usize) -> SimCoords {
        let cols = self.cols as usize;
        let plane = self.rows as usize * cols;
        let stack = index / plane;
        let rem = index % plane;
        SimCoords::new((rem / cols) as i32, (rem % cols) as i32, stack as i32)
    }
}

/// Offsets in {-1, 0, 1}^3 excluding the origin.
static MOORE_OFFSETS: [(i32, i32, i32); 26] = {
    let mut out = [(0, 0, 0); 26];
    let mut n = 0;
    let mut i = 0;
    while i < 27 {
        let (dr, dc, ds) = (i / 9 - 1, (i / 3) % 3 - 1, i % 3 - 1);
        if !(dr == 0 && dc == 0 && ds == 0) {
            out[n] = (dr, dc, ds);
            n += 1;
        }
        i += 1;
    }
    out
};
