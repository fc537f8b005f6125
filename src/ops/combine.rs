/// Reduce stage: multiply-and-sum every block pair that met at one output key
///
/// Architecture:
/// - Records of one group are partitioned by matrix into k -> entries maps,
///   k being the contraction index (A: block column, B: block row)
/// - Only contraction indices present on both sides are visited
/// - Per k, a local join on A.inner_col == B.inner_row feeds a sparse
///   accumulator keyed by (output row, output column)
///
/// Join dispatch:
/// - `RowIndexed` indexes B's entries by inner row, then probes once per A entry
/// - `NestedLoop` compares every A entry with every B entry (reference only)
///
/// Determinism:
/// - Contraction indices are visited in ascending order
/// - Each side's entries are sorted by (row, col, value) before the join
/// - Every output cell therefore sees the same sequence of floating-point
///   additions whatever order records arrive in, bit for bit
///
/// Duplicate (row, col) entries on either side sum.

use std::collections::{BTreeMap, HashMap};

use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::error::JobError;
use crate::core::types::{Matrix, OutputBlockKey, OutputCell, RoutedRecord};
use crate::parsing::format_routed;

/// Local join used inside one output block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum JoinStrategy {
    /// Hash join on B's inner row
    #[default]
    RowIndexed,
    /// Quadratic scan over both sides
    NestedLoop,
}

/// (inner_row, inner_col, value)
type Entry = (usize, usize, f64);

/// Sparse accumulator: (output row, output col) -> running sum
type Accumulator = HashMap<(usize, usize), f64>;

/// Reduce one group with the default row-indexed join
pub fn combine(key: OutputBlockKey, records: &[RoutedRecord]) -> Result<Vec<OutputCell>, JobError> {
    combine_with(key, records, JoinStrategy::RowIndexed)
}

/// Reduce one group: all records routed to `key`, in any order
///
/// # Errors
/// `InvalidRecord` if a record's destination is not `key`
pub fn combine_with(
    key: OutputBlockKey,
    records: &[RoutedRecord],
    strategy: JoinStrategy,
) -> Result<Vec<OutputCell>, JobError> {
    let mut by_k_a: BTreeMap<usize, Vec<Entry>> = BTreeMap::new();
    let mut by_k_b: BTreeMap<usize, Vec<Entry>> = BTreeMap::new();

    for record in records {
        if record.dest != key {
            return Err(JobError::invalid_group_record(
                format_routed(record),
                format!("routed to {} but reduced under {}", record.dest, key),
            ));
        }
        let cell = &record.payload;
        let side = match cell.matrix {
            Matrix::A => &mut by_k_a,
            Matrix::B => &mut by_k_b,
        };
        side.entry(cell.contraction_index())
            .or_default()
            .push((cell.inner_row, cell.inner_col, cell.value));
    }

    for entries in by_k_a.values_mut().chain(by_k_b.values_mut()) {
        entries.sort_by(|x, y| (x.0, x.1).cmp(&(y.0, y.1)).then(x.2.total_cmp(&y.2)));
    }

    let mut acc = Accumulator::new();
    let mut joined = 0usize;

    // Ascending k, skipping indices missing on either side
    for (k, a_entries) in &by_k_a {
        let Some(b_entries) = by_k_b.get(k) else {
            continue;
        };
        joined += 1;
        match strategy {
            JoinStrategy::RowIndexed => join_row_indexed(a_entries, b_entries, &mut acc),
            JoinStrategy::NestedLoop => join_nested_loop(a_entries, b_entries, &mut acc),
        }
    }

    let cells: Vec<OutputCell> = acc
        .into_iter()
        .filter(|&(_, value)| value != 0.0)
        .map(|((row, col), value)| OutputCell { row, col, value })
        .collect();

    debug!(
        "Reduced block {}: {} A / {} B contraction indices, {} joined, {} cells",
        key,
        by_k_a.len(),
        by_k_b.len(),
        joined,
        cells.len()
    );
    Ok(cells)
}

/// Row-indexed join for one contraction index
/// rowIndex: B inner row -> [(B inner col, value)], probed by A's inner column.
/// Buckets keep B's sorted order, so products reach the accumulator in the
/// same sequence as with the nested loop.
fn join_row_indexed(a_entries: &[Entry], b_entries: &[Entry], acc: &mut Accumulator) {
    let mut row_index: HashMap<usize, Vec<(usize, f64)>> = HashMap::new();
    for &(rb, cb, vb) in b_entries {
        row_index.entry(rb).or_default().push((cb, vb));
    }

    for &(ra, ca, va) in a_entries {
        if let Some(matches) = row_index.get(&ca) {
            for &(cb, vb) in matches {
                *acc.entry((ra, cb)).or_insert(0.0) += va * vb;
            }
        }
    }
}

/// Nested-loop join for one contraction index
fn join_nested_loop(a_entries: &[Entry], b_entries: &[Entry], acc: &mut Accumulator) {
    for &(ra, ca, va) in a_entries {
        for &(rb, cb, vb) in b_entries {
            if ca == rb {
                *acc.entry((ra, cb)).or_insert(0.0) += va * vb;
            }
        }
    }
}
