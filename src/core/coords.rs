/// Block coordinate model
///
/// Maps a global matrix cell (row, col) to its block and the position inside
/// that block, and back. Blocks are square, `block_size × block_size`, laid out
/// row-major over the grid:
///   block_row = row / block_size,  inner_row = row % block_size
///   block_col = col / block_size,  inner_col = col % block_size

use super::error::JobError;
use super::types::{Cell, Matrix};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    block_size: usize,
}

impl BlockLayout {
    pub fn new(block_size: usize) -> Result<Self, JobError> {
        if block_size == 0 {
            return Err(JobError::Configuration(
                "block size must be greater than 0".to_string(),
            ));
        }
        Ok(Self { block_size })
    }

    /// Layout for an `n × n` matrix cut into a `grid_dim × grid_dim` grid
    ///
    /// # Errors
    /// `Configuration` if `grid_dim` is 0 or does not evenly divide `n`.
    /// Ragged edge blocks are not supported, there is no padding scheme.
    pub fn for_matrix(n: usize, grid_dim: usize) -> Result<Self, JobError> {
        if grid_dim == 0 {
            return Err(JobError::Configuration(
                "grid dimension must be greater than 0".to_string(),
            ));
        }
        if n == 0 || n % grid_dim != 0 {
            return Err(JobError::Configuration(format!(
                "grid dimension {} does not evenly divide matrix dimension {}",
                grid_dim, n
            )));
        }
        Self::new(n / grid_dim)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Global (row, col) -> (block_row, block_col, inner_row, inner_col)
    pub fn to_block(&self, row: usize, col: usize) -> (usize, usize, usize, usize) {
        (
            row / self.block_size,
            col / self.block_size,
            row % self.block_size,
            col % self.block_size,
        )
    }

    /// (block_row, block_col, inner_row, inner_col) -> global (row, col)
    ///
    /// # Errors
    /// `InvalidCoordinate` if an inner index is outside the block, or if the
    /// global index does not fit in `usize`; the error then carries the
    /// block indices.
    pub fn to_global(
        &self,
        block_row: usize,
        block_col: usize,
        inner_row: usize,
        inner_col: usize,
    ) -> Result<(usize, usize), JobError> {
        if inner_row >= self.block_size || inner_col >= self.block_size {
            return Err(JobError::InvalidCoordinate {
                row: inner_row,
                col: inner_col,
                block_size: self.block_size,
            });
        }
        let global = |block: usize, inner: usize| {
            block.checked_mul(self.block_size)?.checked_add(inner)
        };
        match (global(block_row, inner_row), global(block_col, inner_col)) {
            (Some(row), Some(col)) => Ok((row, col)),
            _ => Err(JobError::InvalidCoordinate {
                row: block_row,
                col: block_col,
                block_size: self.block_size,
            }),
        }
    }

    pub fn cell_at(&self, matrix: Matrix, row: usize, col: usize, value: f64) -> Cell {
        let (block_row, block_col, inner_row, inner_col) = self.to_block(row, col);
        Cell::new(matrix, block_row, block_col, inner_row, inner_col, value)
    }
}
