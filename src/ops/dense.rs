/// Dense reference path
///
/// Used to verify the block pipeline: decompose a dense matrix into input
/// cells, reassemble emitted output cells, and compare against a plain
/// triple-loop product.
///
/// Matrix Layout:
/// - Square matrices stored in row-major order
/// - data[i * n + j] = M[i, j]

use crate::core::coords::BlockLayout;
use crate::core::error::JobError;
use crate::core::types::{Cell, Matrix, OutputBlockKey, OutputCell};

#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    /// Build from rows; every row must have length `rows.len()`
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, JobError> {
        let n = rows.len();
        let mut data = Vec::with_capacity(n * n);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(JobError::Configuration(format!(
                    "row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self { n, data })
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.n + col] = value;
    }

    /// Rebuild one input matrix from its cells; cells of the other matrix are
    /// ignored and duplicate entries sum
    pub fn from_cells<'a, I>(n: usize, layout: &BlockLayout, matrix: Matrix, cells: I) -> Result<Self, JobError>
    where
        I: IntoIterator<Item = &'a Cell>,
    {
        let mut m = Self::zeros(n);
        for cell in cells.into_iter().filter(|c| c.matrix == matrix) {
            let (row, col) = layout.to_global(cell.block_row, cell.block_col, cell.inner_row, cell.inner_col)?;
            if row >= n || col >= n {
                return Err(JobError::Configuration(format!(
                    "cell ({}, {}) of matrix {} lies outside a {}x{} matrix",
                    row, col, matrix, n, n
                )));
            }
            m.set(row, col, m.get(row, col) + cell.value);
        }
        Ok(m)
    }

    /// Decompose into input cells for `matrix`; zero entries are not emitted
    pub fn to_cells(&self, matrix: Matrix, layout: &BlockLayout) -> Vec<Cell> {
        let mut cells = Vec::new();
        for row in 0..self.n {
            for col in 0..self.n {
                let value = self.get(row, col);
                if value != 0.0 {
                    cells.push(layout.cell_at(matrix, row, col, value));
                }
            }
        }
        cells
    }
}

/// Reference product C = A × B
pub fn multiply(a: &DenseMatrix, b: &DenseMatrix) -> Result<DenseMatrix, JobError> {
    if a.n != b.n {
        return Err(JobError::Configuration(format!(
            "dimension mismatch: {}x{} times {}x{}",
            a.n, a.n, b.n, b.n
        )));
    }
    let n = a.n;
    let mut c = DenseMatrix::zeros(n);

    // i-k-j order keeps the inner loop contiguous in both B and C
    for i in 0..n {
        for k in 0..n {
            let a_ik = a.data[i * n + k];
            if a_ik == 0.0 {
                continue;
            }
            for j in 0..n {
                c.data[i * n + j] += a_ik * b.data[k * n + j];
            }
        }
    }
    Ok(c)
}

/// Reassemble output cells of an `n × n` result into a dense matrix
///
/// # Errors
/// `InvalidCoordinate` if a cell falls outside its block, `Configuration`
/// if it lands outside the matrix.
pub fn assemble<'a, I>(n: usize, layout: &BlockLayout, cells: I) -> Result<DenseMatrix, JobError>
where
    I: IntoIterator<Item = &'a (OutputBlockKey, OutputCell)>,
{
    let mut c = DenseMatrix::zeros(n);
    for (key, cell) in cells {
        let (row, col) = layout.to_global(key.block_row, key.block_col, cell.row, cell.col)?;
        if row >= n || col >= n {
            return Err(JobError::Configuration(format!(
                "output cell ({}, {}) of block {} lies outside a {}x{} matrix",
                cell.row, cell.col, key, n, n
            )));
        }
        // Keys are disjoint, so each global cell is written at most once
        c.set(row, col, c.get(row, col) + cell.value);
    }
    Ok(c)
}

/// Largest |a - b| / max(|b|, 1) over all entries
pub fn max_relative_error(actual: &DenseMatrix, expected: &DenseMatrix) -> f64 {
    actual
        .data
        .iter()
        .zip(&expected.data)
        .map(|(a, e)| (a - e).abs() / e.abs().max(1.0))
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiply_simple() {
        let a = DenseMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let b = DenseMatrix::from_rows(&[vec![5.0, 6.0], vec![7.0, 8.0]]).unwrap();
        let c = multiply(&a, &b).unwrap();
        let expected = DenseMatrix::from_rows(&[vec![19.0, 22.0], vec![43.0, 50.0]]).unwrap();
        assert!(max_relative_error(&c, &expected) < 1e-12);
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        assert!(DenseMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
    }

    #[test]
    fn test_to_cells_skips_zeros() {
        let m = DenseMatrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 4.0]]).unwrap();
        let layout = BlockLayout::new(1).unwrap();
        let cells = m.to_cells(Matrix::A, &layout);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[1], Cell::new(Matrix::A, 1, 1, 0, 0, 4.0));
    }

    #[test]
    fn test_from_cells_sums_duplicates() {
        let layout = BlockLayout::new(2).unwrap();
        let cells = vec![
            Cell::new(Matrix::A, 1, 0, 1, 1, 2.0),
            Cell::new(Matrix::A, 1, 0, 1, 1, 0.5),
            Cell::new(Matrix::B, 0, 0, 0, 0, 9.0),
        ];
        let a = DenseMatrix::from_cells(4, &layout, Matrix::A, &cells).unwrap();
        assert_eq!(a.get(3, 1), 2.5);
        assert_eq!(a.get(0, 0), 0.0);
        assert!(DenseMatrix::from_cells(2, &layout, Matrix::A, &cells).is_err());
    }

    #[test]
    fn test_assemble() {
        let layout = BlockLayout::new(2).unwrap();
        let cells = vec![
            (OutputBlockKey::new(0, 1), OutputCell { row: 1, col: 0, value: 3.0 }),
            (OutputBlockKey::new(1, 1), OutputCell { row: 1, col: 1, value: 9.0 }),
        ];
        let c = assemble(4, &layout, &cells).unwrap();
        assert_eq!(c.get(1, 2), 3.0);
        assert_eq!(c.get(3, 3), 9.0);
        assert_eq!(c.get(0, 0), 0.0);

        let outside = vec![(OutputBlockKey::new(2, 0), OutputCell { row: 0, col: 0, value: 1.0 })];
        assert!(assemble(4, &layout, &outside).is_err());
    }
}
