/// In-process map/shuffle/reduce driver
///
/// Stages:
/// 1. Map: parse, validate and route every input line (parallel over lines)
/// 2. Shuffle: group routed records by output block; a full barrier, no group
///    is reduced before every line has been mapped
/// 3. Reduce: combine each group independently (parallel over groups)
///
/// No state is shared between groups, so the reduce stage needs no locking.

use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{ErrorPolicy, ExecutionMode, JobConfig};
use crate::core::error::JobError;
use crate::core::types::{GridConfig, OutputBlockKey, OutputCell, RoutedRecord};
use crate::engine::shuffle::{HashShuffle, Shuffle};
use crate::ops::combine::combine_with;
use crate::ops::route::route_checked;
use crate::parsing::parse_cell;

/// Counters reported by every run, in-process or streaming
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub lines_read: usize,
    pub lines_skipped: usize,
    pub records_routed: usize,
    pub groups_reduced: usize,
    pub cells_emitted: usize,
}

impl JobStats {
    /// Apply the error policy to one record-level failure
    ///
    /// Returns the error back when the job has to stop.
    pub(crate) fn absorb(&mut self, err: JobError, policy: ErrorPolicy) -> Result<(), JobError> {
        if policy == ErrorPolicy::Skip && err.is_record_error() {
            warn!("Skipping record: {}", err);
            self.lines_skipped += 1;
            Ok(())
        } else {
            Err(err)
        }
    }
}

/// Result of one job: an unordered multiset of (output block, cell)
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub cells: Vec<(OutputBlockKey, OutputCell)>,
    pub stats: JobStats,
}

impl JobOutput {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells ordered by block key, then row, then column
    /// Only for stable writing and diffing, the job itself guarantees no order
    pub fn sorted(mut self) -> Self {
        self.cells.sort_by(|(ka, ca), (kb, cb)| {
            (ka, ca.row, ca.col).cmp(&(kb, cb.row, cb.col))
        });
        self
    }
}

pub struct Pipeline {
    config: JobConfig,
    grid: GridConfig,
    pool: Option<rayon::ThreadPool>,
    shuffle: Box<dyn Shuffle + Send + Sync>,
}

impl Pipeline {
    /// Validate the config and prepare the engine; nothing runs yet
    ///
    /// # Errors
    /// `Configuration` for a zero grid dimension, block size or thread count,
    /// or if the dedicated thread pool cannot be built.
    pub fn configure(config: JobConfig) -> Result<Self, JobError> {
        config.validate()?;
        let grid = config.grid()?;

        let pool = match (config.mode, config.threads) {
            (ExecutionMode::Parallel, Some(threads)) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| JobError::Configuration(format!("failed to build thread pool: {}", e)))?,
            ),
            _ => None,
        };

        info!(
            "Configured pipeline: grid {}x{}, block size {}, join {:?}, mode {:?}, on error {:?}",
            grid.grid_dim(),
            grid.grid_dim(),
            grid.block_size().map_or("unchecked".to_string(), |b| b.to_string()),
            config.join,
            config.mode,
            config.on_error
        );

        Ok(Self {
            config,
            grid,
            pool,
            shuffle: Box::new(HashShuffle),
        })
    }

    /// Replace the default in-memory shuffle
    pub fn with_shuffle<S: Shuffle + Send + Sync + 'static>(mut self, shuffle: S) -> Self {
        self.shuffle = Box::new(shuffle);
        self
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Run the whole job over raw input lines
    ///
    /// Blank lines are ignored. Bad records abort the job or are skipped,
    /// depending on the configured `ErrorPolicy`; under `Abort` the error
    /// reported is the one with the lowest line number.
    pub fn submit<I, S>(&self, lines: I) -> Result<JobOutput, JobError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str> + Sync,
    {
        let lines: Vec<S> = lines.into_iter().collect();
        match &self.pool {
            Some(pool) => pool.install(|| self.run(&lines)),
            None => self.run(&lines),
        }
    }

    fn run<S: AsRef<str> + Sync>(&self, lines: &[S]) -> Result<JobOutput, JobError> {
        let mut stats = JobStats::default();

        // Map
        let mapped = self.map_lines(lines);
        let mut records: Vec<RoutedRecord> = Vec::new();
        for outcome in mapped {
            match outcome {
                Ok(None) => {}
                Ok(Some(routed)) => {
                    stats.lines_read += 1;
                    records.extend(routed);
                }
                Err(err) => {
                    stats.lines_read += 1;
                    stats.absorb(err, self.config.on_error)?;
                }
            }
        }
        stats.records_routed = records.len();
        info!(
            "Map stage done: {} lines, {} skipped, {} records routed",
            stats.lines_read, stats.lines_skipped, stats.records_routed
        );

        // Shuffle
        let groups = self.shuffle.group(records);
        stats.groups_reduced = groups.len();
        info!("Shuffle stage done: {} groups", groups.len());

        // Reduce
        let reduced = self.reduce_groups(&groups)?;
        let cells: Vec<(OutputBlockKey, OutputCell)> = reduced
            .into_iter()
            .flat_map(|(key, cells)| cells.into_iter().map(move |cell| (key, cell)))
            .collect();
        stats.cells_emitted = cells.len();
        info!("Reduce stage done: {} non-zero cells", stats.cells_emitted);

        Ok(JobOutput { cells, stats })
    }

    /// One outcome per line, in input order; `Ok(None)` for blank lines
    fn map_lines<S: AsRef<str> + Sync>(
        &self,
        lines: &[S],
    ) -> Vec<Result<Option<Vec<RoutedRecord>>, JobError>> {
        let map_one = |(idx, line): (usize, &S)| self.map_line(idx + 1, line.as_ref());
        match self.config.mode {
            ExecutionMode::Parallel => lines.par_iter().enumerate().map(map_one).collect(),
            ExecutionMode::Sequential => lines.iter().enumerate().map(map_one).collect(),
        }
    }

    fn map_line(&self, line_no: usize, line: &str) -> Result<Option<Vec<RoutedRecord>>, JobError> {
        if line.trim().is_empty() {
            return Ok(None);
        }
        let cell = parse_cell(line_no, line)?;
        route_checked(cell, &self.grid, line_no, line).map(Some)
    }

    fn reduce_groups(
        &self,
        groups: &[(OutputBlockKey, Vec<RoutedRecord>)],
    ) -> Result<Vec<(OutputBlockKey, Vec<OutputCell>)>, JobError> {
        let strategy = self.config.join;
        let reduce_one = |(key, records): &(OutputBlockKey, Vec<RoutedRecord>)| {
            combine_with(*key, records, strategy).map(|cells| (*key, cells))
        };
        match self.config.mode {
            ExecutionMode::Parallel => groups.par_iter().map(reduce_one).collect(),
            ExecutionMode::Sequential => groups.iter().map(reduce_one).collect(),
        }
    }
}
