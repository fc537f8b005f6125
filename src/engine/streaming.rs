/// Streaming phases for an external engine
///
/// Each phase is a line filter: the engine feeds input lines to `map_stream`,
/// sorts or partitions the intermediate lines by key, and feeds each
/// partition to `reduce_stream`. A sort-based shuffle delivers all lines of
/// one key contiguously; `reduce_stream` relies on that and reduces a group
/// as soon as the key changes. The sort must compare bytes (`LC_ALL=C sort`):
/// locale collation that ignores punctuation can interleave `1,1` and `1,10`.

use std::collections::HashSet;
use std::io::{BufRead, Write};

use log::info;

use crate::config::ErrorPolicy;
use crate::core::error::JobError;
use crate::core::types::{GridConfig, OutputBlockKey, RoutedRecord};
use crate::engine::pipeline::JobStats;
use crate::ops::combine::{JoinStrategy, combine_with};
use crate::ops::route::route_checked;
use crate::parsing::{OutputFormat, format_output_as, format_routed, parse_cell, parse_routed};

/// Input lines -> intermediate lines (`destRow,destCol<TAB>M,k,r,c,v`)
pub fn map_stream<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    grid: &GridConfig,
    policy: ErrorPolicy,
) -> Result<JobStats, JobError> {
    let mut stats = JobStats::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        stats.lines_read += 1;

        let routed = parse_cell(line_no, &line).and_then(|cell| route_checked(cell, grid, line_no, &line));
        match routed {
            Ok(records) => {
                for record in &records {
                    writeln!(writer, "{}", format_routed(record))?;
                }
                stats.records_routed += records.len();
            }
            Err(err) => stats.absorb(err, policy)?,
        }
    }
    writer.flush()?;

    info!(
        "Streaming map done: {} lines, {} skipped, {} records emitted",
        stats.lines_read, stats.lines_skipped, stats.records_routed
    );
    Ok(stats)
}

/// Key-grouped intermediate lines -> output lines
///
/// # Errors
/// Besides record errors, `InvalidRecord` when a key shows up again after its
/// group was already reduced: the shuffle did not deliver the group in one piece.
pub fn reduce_stream<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    strategy: JoinStrategy,
    policy: ErrorPolicy,
    format: OutputFormat,
) -> Result<JobStats, JobError> {
    let mut stats = JobStats::default();
    let mut current: Option<OutputBlockKey> = None;
    let mut group: Vec<RoutedRecord> = Vec::new();
    let mut closed: HashSet<OutputBlockKey> = HashSet::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        stats.lines_read += 1;

        let record = match parse_routed(line_no, &line) {
            Ok(record) => record,
            Err(err) => {
                stats.absorb(err, policy)?;
                continue;
            }
        };

        if current != Some(record.dest) {
            if closed.contains(&record.dest) {
                let err = JobError::invalid_record(
                    line_no,
                    &line,
                    format!("key {} reappeared after its group was reduced", record.dest),
                );
                stats.absorb(err, policy)?;
                continue;
            }
            if let Some(key) = current.take() {
                emit_group(writer, key, &group, strategy, format, &mut stats)?;
                closed.insert(key);
                group.clear();
            }
            current = Some(record.dest);
        }
        stats.records_routed += 1;
        group.push(record);
    }

    if let Some(key) = current {
        emit_group(writer, key, &group, strategy, format, &mut stats)?;
    }
    writer.flush()?;

    info!(
        "Streaming reduce done: {} groups, {} cells, {} lines skipped",
        stats.groups_reduced, stats.cells_emitted, stats.lines_skipped
    );
    Ok(stats)
}

fn emit_group<W: Write>(
    writer: &mut W,
    key: OutputBlockKey,
    group: &[RoutedRecord],
    strategy: JoinStrategy,
    format: OutputFormat,
    stats: &mut JobStats,
) -> Result<(), JobError> {
    let cells = combine_with(key, group, strategy)?;
    for cell in &cells {
        writeln!(writer, "{}", format_output_as(&key, cell, format)?)?;
    }
    stats.groups_reduced += 1;
    stats.cells_emitted += cells.len();
    Ok(())
}
