/// Map stage: replicate each input cell to every output block that needs it
///
/// C(i,j) = sum_k A(i,k) × B(k,j), so
/// - A(i,k) is needed by every C(i, j) for j in 0..grid_dim (row-replicate)
/// - B(k,j) is needed by every C(i, j) for i in 0..grid_dim (column-replicate)
///
/// Every (A, B) block pair sharing a contraction index k then meets at exactly
/// one key, (A's block row, B's block column), without an all-pairs shuffle.
/// The cost is a fan-out of exactly `grid_dim` records per input cell.

use crate::core::error::JobError;
use crate::core::types::{Cell, GridConfig, Matrix, OutputBlockKey, RoutedRecord};

/// Route one cell; returns exactly `grid_dim` records
pub fn route(cell: Cell, grid_dim: usize) -> Vec<RoutedRecord> {
    let mut out = Vec::with_capacity(grid_dim);
    route_into(cell, grid_dim, &mut out);
    out
}

/// Same as `route`, appending into a caller-owned buffer
pub fn route_into(cell: Cell, grid_dim: usize, out: &mut Vec<RoutedRecord>) {
    out.reserve(grid_dim);
    match cell.matrix {
        Matrix::A => {
            for j in 0..grid_dim {
                out.push(RoutedRecord {
                    dest: OutputBlockKey::new(cell.block_row, j),
                    payload: cell,
                });
            }
        }
        Matrix::B => {
            for i in 0..grid_dim {
                out.push(RoutedRecord {
                    dest: OutputBlockKey::new(i, cell.block_col),
                    payload: cell,
                });
            }
        }
    }
}

/// Validate the cell against the grid, then route it
///
/// # Errors
/// `InvalidRecord` if a block index falls outside the grid, or an inner index
/// outside the block when the grid knows its block size. `line_no` and
/// `line` are only used for the error context.
pub fn route_checked(
    cell: Cell,
    grid: &GridConfig,
    line_no: usize,
    line: &str,
) -> Result<Vec<RoutedRecord>, JobError> {
    grid.check_cell(&cell)
        .map_err(|reason| JobError::invalid_record(line_no, line, reason))?;
    Ok(route(cell, grid.grid_dim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_route_a_replicates_along_block_row() {
        let cell = Cell::new(Matrix::A, 1, 2, 0, 0, 3.0);
        let records = route(cell, 4);
        assert_eq!(records.len(), 4);

        let keys: HashSet<OutputBlockKey> = records.iter().map(|r| r.dest).collect();
        assert_eq!(keys.len(), 4);
        for record in &records {
            assert_eq!(record.dest.block_row, 1);
            assert_eq!(record.payload, cell);
        }
    }

    #[test]
    fn test_route_b_replicates_along_block_col() {
        let cell = Cell::new(Matrix::B, 2, 3, 1, 1, -1.0);
        let records = route(cell, 5);
        assert_eq!(records.len(), 5);

        let rows: HashSet<usize> = records.iter().map(|r| r.dest.block_row).collect();
        assert_eq!(rows, (0..5).collect());
        assert!(records.iter().all(|r| r.dest.block_col == 3 && r.payload == cell));
    }

    #[test]
    fn test_pair_meets_at_single_key() {
        // A(i=0, k=1) and B(k=1, j=2) must co-locate only at (0, 2)
        let a = route(Cell::new(Matrix::A, 0, 1, 0, 0, 1.0), 3);
        let b = route(Cell::new(Matrix::B, 1, 2, 0, 0, 1.0), 3);
        let a_keys: HashSet<OutputBlockKey> = a.iter().map(|r| r.dest).collect();
        let b_keys: HashSet<OutputBlockKey> = b.iter().map(|r| r.dest).collect();
        let shared: Vec<_> = a_keys.intersection(&b_keys).collect();
        assert_eq!(shared, vec![&OutputBlockKey::new(0, 2)]);
    }

    #[test]
    fn test_route_into_appends() {
        let mut out = Vec::new();
        route_into(Cell::new(Matrix::A, 0, 0, 0, 0, 1.0), 2, &mut out);
        route_into(Cell::new(Matrix::B, 0, 0, 0, 0, 1.0), 2, &mut out);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_route_checked_rejects_out_of_grid() {
        let grid = GridConfig::new(2).unwrap();
        let line = "A,0,2,0,0,1";
        let cell = Cell::new(Matrix::A, 0, 2, 0, 0, 1.0);
        let err = route_checked(cell, &grid, 3, line).unwrap_err();
        assert!(matches!(err, JobError::InvalidRecord { line: Some(3), .. }));

        let ok = route_checked(Cell::new(Matrix::A, 0, 1, 0, 0, 1.0), &grid, 4, "A,0,1,0,0,1").unwrap();
        assert_eq!(ok.len(), 2);
    }
}
