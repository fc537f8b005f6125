use std::io::Write;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::coords::BlockLayout;
use crate::core::error::JobError;
use crate::core::types::{Cell, Matrix};
use crate::ops::dense::DenseMatrix;
use crate::parsing::format_cell;

/// Random sparse test matrices in block form
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorParams {
    /// Side of both square matrices
    pub n: usize,
    pub grid_dim: usize,
    /// Probability that an entry is non-zero
    pub density: f64,
    pub seed: u64,
}

impl GeneratorParams {
    pub fn new(n: usize, grid_dim: usize) -> Self {
        Self {
            n,
            grid_dim,
            density: 0.2,
            seed: 0,
        }
    }

    pub fn layout(&self) -> Result<BlockLayout, JobError> {
        BlockLayout::for_matrix(self.n, self.grid_dim)
    }
}

/// Generated pair; keeps the dense form around for verification
#[derive(Debug, Clone)]
pub struct GeneratedPair {
    pub a: DenseMatrix,
    pub b: DenseMatrix,
    pub layout: BlockLayout,
}

impl GeneratedPair {
    /// Input cells of A followed by those of B
    pub fn cells(&self) -> Vec<Cell> {
        let mut cells = self.a.to_cells(Matrix::A, &self.layout);
        cells.extend(self.b.to_cells(Matrix::B, &self.layout));
        cells
    }

    pub fn write_lines<W: Write>(&self, writer: &mut W) -> Result<usize, JobError> {
        let cells = self.cells();
        for cell in &cells {
            writeln!(writer, "{}", format_cell(cell))?;
        }
        writer.flush()?;
        Ok(cells.len())
    }
}

/// Draw A and B independently; non-zero values are uniform in [1, 10),
/// rounded to two decimals
///
/// # Errors
/// `Configuration` if the density is outside [0, 1] or `grid_dim` does not
/// evenly divide `n`.
pub fn generate(params: &GeneratorParams) -> Result<GeneratedPair, JobError> {
    if !(0.0..=1.0).contains(&params.density) {
        return Err(JobError::Configuration(format!(
            "density {} is outside [0, 1]",
            params.density
        )));
    }
    let layout = params.layout()?;
    let mut rng = StdRng::seed_from_u64(params.seed);

    let a = random_matrix(&mut rng, params.n, params.density);
    let b = random_matrix(&mut rng, params.n, params.density);

    info!(
        "Generated {}x{} matrices, grid {}x{}, block size {}, density {}",
        params.n,
        params.n,
        params.grid_dim,
        params.grid_dim,
        layout.block_size(),
        params.density
    );
    Ok(GeneratedPair { a, b, layout })
}

fn random_matrix(rng: &mut StdRng, n: usize, density: f64) -> DenseMatrix {
    let mut m = DenseMatrix::zeros(n);
    for i in 0..n {
        for j in 0..n {
            if rng.gen_bool(density) {
                let value: f64 = rng.gen_range(1.0..10.0);
                m.set(i, j, (value * 100.0).round() / 100.0);
            }
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse_cell;

    #[test]
    fn test_seed_is_reproducible() {
        let params = GeneratorParams { seed: 11, ..GeneratorParams::new(10, 2) };
        let first = generate(&params).unwrap();
        let second = generate(&params).unwrap();
        assert_eq!(first.a, second.a);
        assert_eq!(first.b, second.b);
    }

    #[test]
    fn test_values_and_indices_in_range() {
        let params = GeneratorParams { density: 0.5, seed: 3, ..GeneratorParams::new(12, 3) };
        let pair = generate(&params).unwrap();
        for cell in pair.cells() {
            assert!(cell.block_row < 3 && cell.block_col < 3);
            assert!(cell.inner_row < 4 && cell.inner_col < 4);
            assert!(cell.value >= 1.0 && cell.value <= 10.0);
        }
    }

    #[test]
    fn test_written_lines_parse() {
        let params = GeneratorParams { density: 0.3, seed: 5, ..GeneratorParams::new(6, 2) };
        let pair = generate(&params).unwrap();
        let mut out = Vec::new();
        let count = pair.write_lines(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), count);
        for (i, line) in text.lines().enumerate() {
            parse_cell(i + 1, line).unwrap();
        }
    }

    #[test]
    fn test_bad_params() {
        assert!(generate(&GeneratorParams::new(10, 3)).is_err());
        let params = GeneratorParams { density: 1.5, ..GeneratorParams::new(10, 2) };
        assert!(matches!(generate(&params), Err(JobError::Configuration(_))));
    }
}
