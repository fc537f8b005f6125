//! Block sparse matrix multiplication as a map/shuffle/reduce job.
//!
//! Input matrices A and B are cut into a `grid_dim × grid_dim` grid of blocks.
//! The map stage replicates each A cell along its block row and each B cell
//! along its block column, so every block pair A(i,k), B(k,j) meets at output
//! key (i,j). The reduce stage joins the pairs on the contraction index and
//! accumulates a sparse result block.

pub mod config;
pub mod core;
pub mod data;
pub mod engine;
pub mod ops;
pub mod parsing;

pub use crate::config::{ConfigOverrides, ErrorPolicy, ExecutionMode, JobConfig};
pub use crate::core::{Cell, GridConfig, JobError, Matrix, OutputBlockKey, OutputCell, RoutedRecord};
pub use crate::engine::{JobOutput, JobStats, Pipeline};
