use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::core::error::JobError;
use crate::core::types::GridConfig;
use crate::ops::combine::JoinStrategy;

/// What to do with a record that fails to parse or validate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Stop the job at the first bad record
    #[default]
    Abort,
    /// Drop the record, log a warning, count it in the job stats
    Skip,
}

/// How the in-process engine schedules map and reduce work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    Sequential,
    /// Map over input lines and reduce over groups on a rayon pool
    #[default]
    Parallel,
}

/// Per-field overrides, typically from the command line; `None` keeps the
/// base value
#[derive(Debug, Clone, Default, PartialEq, Args)]
pub struct ConfigOverrides {
    #[arg(long)]
    pub grid_dim: Option<usize>,
    #[arg(long)]
    pub block_size: Option<usize>,
    #[arg(long, value_enum)]
    pub on_error: Option<ErrorPolicy>,
    #[arg(long, value_enum)]
    pub join: Option<JoinStrategy>,
    #[arg(long, value_enum)]
    pub mode: Option<ExecutionMode>,
    #[arg(long)]
    pub threads: Option<usize>,
}

/// Job configuration
///
/// JSON form:
/// ```json
/// { "gridDim": 4, "blockSize": 250, "onError": "skip", "join": "row-indexed",
///   "mode": "parallel", "threads": 8 }
/// ```
/// Only `gridDim` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JobConfig {
    pub grid_dim: usize,
    #[serde(default)]
    pub block_size: Option<usize>,
    #[serde(default)]
    pub on_error: ErrorPolicy,
    #[serde(default)]
    pub join: JoinStrategy,
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Size of a dedicated rayon pool; the global pool is used when unset
    #[serde(default)]
    pub threads: Option<usize>,
}

impl JobConfig {
    pub fn new(grid_dim: usize) -> Self {
        Self {
            grid_dim,
            block_size: None,
            on_error: ErrorPolicy::default(),
            join: JoinStrategy::default(),
            mode: ExecutionMode::default(),
            threads: None,
        }
    }

    /// Load a JSON config file; the result is validated before returning
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        let file = File::open(path.as_ref())?;
        let config: JobConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Config file (when given) with `overrides` applied on top
    ///
    /// # Errors
    /// `Configuration` when there is neither a file nor a grid dimension
    /// override, or when the merged config does not validate.
    pub fn resolve(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, JobError> {
        let base = match path {
            Some(path) => Self::load(path)?,
            None => {
                let grid_dim = overrides.grid_dim.ok_or_else(|| {
                    JobError::Configuration("a grid dimension is required without a config file".to_string())
                })?;
                Self::new(grid_dim)
            }
        };
        let config = base.with_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(grid_dim) = overrides.grid_dim {
            self.grid_dim = grid_dim;
        }
        if overrides.block_size.is_some() {
            self.block_size = overrides.block_size;
        }
        if let Some(policy) = overrides.on_error {
            self.on_error = policy;
        }
        if let Some(join) = overrides.join {
            self.join = join;
        }
        if let Some(mode) = overrides.mode {
            self.mode = mode;
        }
        if overrides.threads.is_some() {
            self.threads = overrides.threads;
        }
        self
    }

    pub fn validate(&self) -> Result<(), JobError> {
        self.grid()?;
        if self.threads == Some(0) {
            return Err(JobError::Configuration(
                "thread count must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Grid view of this config
    pub fn grid(&self) -> Result<GridConfig, JobError> {
        let grid = GridConfig::new(self.grid_dim)?;
        match self.block_size {
            Some(block_size) => grid.with_block_size(block_size),
            None => Ok(grid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let config: JobConfig = serde_json::from_str(r#"{ "gridDim": 3 }"#).unwrap();
        assert_eq!(config, JobConfig::new(3));
        assert_eq!(config.on_error, ErrorPolicy::Abort);
        assert_eq!(config.join, JoinStrategy::RowIndexed);
        assert_eq!(config.mode, ExecutionMode::Parallel);
    }

    #[test]
    fn test_full_json() {
        let json = r#"{
            "gridDim": 4, "blockSize": 25, "onError": "skip",
            "join": "nested-loop", "mode": "sequential", "threads": 2
        }"#;
        let config: JobConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.block_size, Some(25));
        assert_eq!(config.on_error, ErrorPolicy::Skip);
        assert_eq!(config.join, JoinStrategy::NestedLoop);
        assert_eq!(config.mode, ExecutionMode::Sequential);
        assert_eq!(config.threads, Some(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(serde_json::from_str::<JobConfig>(r#"{ "gridDim": 2, "grid": 3 }"#).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(matches!(JobConfig::new(0).validate(), Err(JobError::Configuration(_))));

        let mut config = JobConfig::new(2);
        config.threads = Some(0);
        assert!(matches!(config.validate(), Err(JobError::Configuration(_))));

        let mut config = JobConfig::new(2);
        config.block_size = Some(0);
        assert!(matches!(config.validate(), Err(JobError::Configuration(_))));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            JobConfig::load("./does/not/exist.json"),
            Err(JobError::Io(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let file = config_file(r#"{ "gridDim": 4, "blockSize": 25, "onError": "skip" }"#);
        let config = JobConfig::load(file.path()).unwrap();
        assert_eq!(config.grid_dim, 4);
        assert_eq!(config.block_size, Some(25));
        assert_eq!(config.on_error, ErrorPolicy::Skip);
        assert_eq!(config.mode, ExecutionMode::Parallel);

        let bad = config_file(r#"{ "gridDim": 0 }"#);
        assert!(matches!(JobConfig::load(bad.path()), Err(JobError::Configuration(_))));
        let garbled = config_file("gridDim = 4");
        assert!(matches!(JobConfig::load(garbled.path()), Err(JobError::Json(_))));
    }

    #[test]
    fn test_overrides_win_over_file() {
        let file = config_file(
            r#"{ "gridDim": 4, "blockSize": 25, "join": "nested-loop", "mode": "sequential", "threads": 2 }"#,
        );
        let overrides = ConfigOverrides {
            grid_dim: Some(5),
            on_error: Some(ErrorPolicy::Skip),
            mode: Some(ExecutionMode::Parallel),
            ..ConfigOverrides::default()
        };
        let config = JobConfig::resolve(Some(file.path()), &overrides).unwrap();
        assert_eq!(config.grid_dim, 5);
        assert_eq!(config.on_error, ErrorPolicy::Skip);
        assert_eq!(config.mode, ExecutionMode::Parallel);
        // Fields without an override keep the file's values
        assert_eq!(config.block_size, Some(25));
        assert_eq!(config.join, JoinStrategy::NestedLoop);
        assert_eq!(config.threads, Some(2));

        let unchanged = JobConfig::resolve(Some(file.path()), &ConfigOverrides::default()).unwrap();
        assert_eq!(unchanged, JobConfig::load(file.path()).unwrap());
    }

    #[test]
    fn test_resolve_without_file() {
        let overrides = ConfigOverrides {
            grid_dim: Some(3),
            threads: Some(4),
            ..ConfigOverrides::default()
        };
        let config = JobConfig::resolve(None, &overrides).unwrap();
        assert_eq!(config, JobConfig { threads: Some(4), ..JobConfig::new(3) });

        assert!(matches!(
            JobConfig::resolve(None, &ConfigOverrides::default()),
            Err(JobError::Configuration(_))
        ));
        let zero_threads = ConfigOverrides { threads: Some(0), ..overrides };
        assert!(matches!(
            JobConfig::resolve(None, &zero_threads),
            Err(JobError::Configuration(_))
        ));
    }
}
