use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::JobError;

/// Input matrix identifier
/// C = A × B, so the tag decides which index is the contraction index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Matrix {
    /// Left operand, contracted over its block column
    A,
    /// Right operand, contracted over its block row
    B,
}

impl Matrix {
    /// Parse the single-letter tag used on the wire
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "A" => Some(Matrix::A),
            "B" => Some(Matrix::B),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Matrix::A => "A",
            Matrix::B => "B",
        }
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One scalar entry of one block of one input matrix
/// Immutable once read: the map stage copies it, never edits it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub matrix: Matrix,
    pub block_row: usize,
    pub block_col: usize,
    pub inner_row: usize,
    pub inner_col: usize,
    pub value: f64,
}

impl Cell {
    pub fn new(
        matrix: Matrix,
        block_row: usize,
        block_col: usize,
        inner_row: usize,
        inner_col: usize,
        value: f64,
    ) -> Self {
        Self {
            matrix,
            block_row,
            block_col,
            inner_row,
            inner_col,
            value,
        }
    }

    /// Block index summed over when this cell meets its partner
    /// A(i,k) contributes k = block_col, B(k,j) contributes k = block_row
    pub fn contraction_index(&self) -> usize {
        match self.matrix {
            Matrix::A => self.block_col,
            Matrix::B => self.block_row,
        }
    }
}

/// Block grid shared by both input matrices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Number of blocks per dimension
    grid_dim: usize,
    /// Side of one block, when known; enables inner-index validation
    block_size: Option<usize>,
}

impl GridConfig {
    pub fn new(grid_dim: usize) -> Result<Self, JobError> {
        if grid_dim == 0 {
            return Err(JobError::Configuration(
                "grid dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            grid_dim,
            block_size: None,
        })
    }

    pub fn with_block_size(mut self, block_size: usize) -> Result<Self, JobError> {
        if block_size == 0 {
            return Err(JobError::Configuration(
                "block size must be greater than 0".to_string(),
            ));
        }
        self.block_size = Some(block_size);
        Ok(self)
    }

    pub fn grid_dim(&self) -> usize {
        self.grid_dim
    }

    pub fn block_size(&self) -> Option<usize> {
        self.block_size
    }

    /// Check a cell against the grid
    /// Returns the reason the cell does not fit, if any
    pub fn check_cell(&self, cell: &Cell) -> Result<(), String> {
        if cell.block_row >= self.grid_dim || cell.block_col >= self.grid_dim {
            return Err(format!(
                "block ({}, {}) is outside a {}x{} grid",
                cell.block_row, cell.block_col, self.grid_dim, self.grid_dim
            ));
        }
        if let Some(block_size) = self.block_size {
            if cell.inner_row >= block_size || cell.inner_col >= block_size {
                return Err(format!(
                    "inner index ({}, {}) is outside a {}x{} block",
                    cell.inner_row, cell.inner_col, block_size, block_size
                ));
            }
        }
        Ok(())
    }
}

/// Block coordinates of the result matrix C; the shuffle key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputBlockKey {
    pub block_row: usize,
    pub block_col: usize,
}

impl OutputBlockKey {
    pub fn new(block_row: usize, block_col: usize) -> Self {
        Self {
            block_row,
            block_col,
        }
    }
}

impl fmt::Display for OutputBlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.block_row, self.block_col)
    }
}

/// A cell tagged with the output block that needs to see it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutedRecord {
    pub dest: OutputBlockKey,
    pub payload: Cell,
}

/// Non-zero entry of one output block, in inner (intra-block) coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputCell {
    pub row: usize,
    pub col: usize,
    pub value: f64,
}
