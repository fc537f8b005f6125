use thiserror::Error;

/// Every failure the pipeline can surface.
///
/// Record-level variants carry the 1-based input line number and the raw
/// line so the offending record can be located without re-running the job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("parse error at line {line}: {reason} (record: {content:?})")]
    Parse {
        line: usize,
        content: String,
        reason: String,
    },

    #[error("invalid record{}: {reason} (record: {content:?})", at_line(.line))]
    InvalidRecord {
        /// None when the record never came from a numbered line (in-memory groups)
        line: Option<usize>,
        content: String,
        reason: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid coordinate ({row}, {col}) for block size {block_size}")]
    InvalidCoordinate {
        row: usize,
        col: usize,
        block_size: usize,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl JobError {
    pub fn parse(line: usize, content: &str, reason: impl Into<String>) -> Self {
        JobError::Parse {
            line,
            content: content.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_record(line: usize, content: &str, reason: impl Into<String>) -> Self {
        JobError::InvalidRecord {
            line: Some(line),
            content: content.to_string(),
            reason: reason.into(),
        }
    }

    /// Invalid record with no source line, e.g. found while reducing a group
    pub fn invalid_group_record(content: String, reason: impl Into<String>) -> Self {
        JobError::InvalidRecord {
            line: None,
            content,
            reason: reason.into(),
        }
    }

    /// Record-level errors are the only ones an `ErrorPolicy::Skip` may drop.
    pub fn is_record_error(&self) -> bool {
        matches!(self, JobError::Parse { .. } | JobError::InvalidRecord { .. })
    }
}

fn at_line(line: &Option<usize>) -> String {
    match line {
        Some(n) => format!(" at line {}", n),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_errors_are_classified() {
        assert!(JobError::parse(3, "A,1", "expected 6 fields").is_record_error());
        assert!(JobError::invalid_record(1, "C,0,0,0,0,1", "unknown matrix").is_record_error());
        assert!(!JobError::Configuration("grid dimension must be > 0".into()).is_record_error());
    }

    #[test]
    fn test_message_names_line_and_content() {
        let err = JobError::parse(7, "A,x,0,0,0,1", "block row is not an integer");
        let msg = err.to_string();
        assert!(msg.contains("line 7"));
        assert!(msg.contains("A,x,0,0,0,1"));

        let err = JobError::invalid_group_record("0,1\tA,0,0,0,1".into(), "wrong key");
        assert!(err.to_string().starts_with("invalid record: wrong key"));
    }
}
