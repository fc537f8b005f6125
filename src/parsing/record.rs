// Line codecs for the three record kinds that cross the engine boundary:
//   input:        M,blockRow,blockCol,innerRow,innerCol,value
//   intermediate: destRow,destCol<TAB>M,k,innerRow,innerCol,value
//   output:       blockRow,blockCol<TAB>row,col,value   (or one JSON object)
// Line numbers are 1-based and only used for error context.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::core::error::JobError;
use crate::core::types::{Cell, Matrix, OutputBlockKey, OutputCell, RoutedRecord};

const CELL_FIELDS: usize = 6;
const ROUTED_KEY_FIELDS: usize = 2;
const ROUTED_VALUE_FIELDS: usize = 5;
const OUTPUT_VALUE_FIELDS: usize = 3;

/// Parse one input line into a `Cell`
///
/// # Errors
/// - `Parse` on a wrong field count, a non-integer index or a non-finite value
/// - `InvalidRecord` on an unknown matrix tag or a negative index
pub fn parse_cell(line_no: usize, line: &str) -> Result<Cell, JobError> {
    let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    if fields.len() != CELL_FIELDS {
        return Err(JobError::parse(
            line_no,
            line,
            format!("expected {} fields, found {}", CELL_FIELDS, fields.len()),
        ));
    }

    let matrix = parse_matrix(line_no, line, fields[0])?;
    let block_row = parse_index(line_no, line, fields[1], "block row")?;
    let block_col = parse_index(line_no, line, fields[2], "block column")?;
    let inner_row = parse_index(line_no, line, fields[3], "inner row")?;
    let inner_col = parse_index(line_no, line, fields[4], "inner column")?;
    let value = parse_value(line_no, line, fields[5])?;

    Ok(Cell::new(matrix, block_row, block_col, inner_row, inner_col, value))
}

pub fn format_cell(cell: &Cell) -> String {
    format!(
        "{},{},{},{},{},{}",
        cell.matrix, cell.block_row, cell.block_col, cell.inner_row, cell.inner_col, cell.value
    )
}

/// Intermediate form: only the contraction index of the payload travels,
/// the other block index is implied by the destination key.
pub fn format_routed(record: &RoutedRecord) -> String {
    let cell = &record.payload;
    format!(
        "{},{}\t{},{},{},{},{}",
        record.dest.block_row,
        record.dest.block_col,
        cell.matrix,
        cell.contraction_index(),
        cell.inner_row,
        cell.inner_col,
        cell.value
    )
}

pub fn parse_routed(line_no: usize, line: &str) -> Result<RoutedRecord, JobError> {
    let (key_part, value_part) = line
        .trim()
        .split_once('\t')
        .ok_or_else(|| JobError::parse(line_no, line, "missing tab between key and value"))?;

    let dest = parse_key(line_no, line, key_part)?;

    let fields: Vec<&str> = value_part.split(',').map(str::trim).collect();
    if fields.len() != ROUTED_VALUE_FIELDS {
        return Err(JobError::parse(
            line_no,
            line,
            format!("expected {} value fields, found {}", ROUTED_VALUE_FIELDS, fields.len()),
        ));
    }

    let matrix = parse_matrix(line_no, line, fields[0])?;
    let k = parse_index(line_no, line, fields[1], "contraction index")?;
    let inner_row = parse_index(line_no, line, fields[2], "inner row")?;
    let inner_col = parse_index(line_no, line, fields[3], "inner column")?;
    let value = parse_value(line_no, line, fields[4])?;

    // Rebuild the full cell from the key and the contraction index
    let payload = match matrix {
        Matrix::A => Cell::new(matrix, dest.block_row, k, inner_row, inner_col, value),
        Matrix::B => Cell::new(matrix, k, dest.block_col, inner_row, inner_col, value),
    };
    Ok(RoutedRecord { dest, payload })
}

pub fn format_output(key: &OutputBlockKey, cell: &OutputCell) -> String {
    format!(
        "{},{}\t{},{},{}",
        key.block_row, key.block_col, cell.row, cell.col, cell.value
    )
}

#[derive(Serialize)]
struct OutputLine {
    key: (usize, usize),
    row: usize,
    col: usize,
    value: f64,
}

pub fn format_output_json(key: &OutputBlockKey, cell: &OutputCell) -> Result<String, JobError> {
    let line = OutputLine {
        key: (key.block_row, key.block_col),
        row: cell.row,
        col: cell.col,
        value: cell.value,
    };
    Ok(serde_json::to_string(&line)?)
}

/// Encoding of output lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn format_output_as(
    key: &OutputBlockKey,
    cell: &OutputCell,
    format: OutputFormat,
) -> Result<String, JobError> {
    match format {
        OutputFormat::Text => Ok(format_output(key, cell)),
        OutputFormat::Json => format_output_json(key, cell),
    }
}

/// Parse a text output line back, used when verifying a finished job
pub fn parse_output(line_no: usize, line: &str) -> Result<(OutputBlockKey, OutputCell), JobError> {
    let (key_part, value_part) = line
        .trim()
        .split_once('\t')
        .ok_or_else(|| JobError::parse(line_no, line, "missing tab between key and value"))?;
    let key = parse_key(line_no, line, key_part)?;

    let fields: Vec<&str> = value_part.split(',').map(str::trim).collect();
    if fields.len() != OUTPUT_VALUE_FIELDS {
        return Err(JobError::parse(
            line_no,
            line,
            format!("expected {} value fields, found {}", OUTPUT_VALUE_FIELDS, fields.len()),
        ));
    }
    let row = parse_index(line_no, line, fields[0], "row")?;
    let col = parse_index(line_no, line, fields[1], "column")?;
    let value = parse_value(line_no, line, fields[2])?;
    Ok((key, OutputCell { row, col, value }))
}

fn parse_key(line_no: usize, line: &str, key_part: &str) -> Result<OutputBlockKey, JobError> {
    let fields: Vec<&str> = key_part.split(',').map(str::trim).collect();
    if fields.len() != ROUTED_KEY_FIELDS {
        return Err(JobError::parse(
            line_no,
            line,
            format!("expected {} key fields, found {}", ROUTED_KEY_FIELDS, fields.len()),
        ));
    }
    let block_row = parse_index(line_no, line, fields[0], "key block row")?;
    let block_col = parse_index(line_no, line, fields[1], "key block column")?;
    Ok(OutputBlockKey::new(block_row, block_col))
}

fn parse_matrix(line_no: usize, line: &str, field: &str) -> Result<Matrix, JobError> {
    Matrix::from_tag(field).ok_or_else(|| {
        JobError::invalid_record(line_no, line, format!("unknown matrix tag {:?}", field))
    })
}

fn parse_index(line_no: usize, line: &str, field: &str, what: &str) -> Result<usize, JobError> {
    let raw: i64 = field.parse().map_err(|_| {
        JobError::parse(line_no, line, format!("{} {:?} is not an integer", what, field))
    })?;
    usize::try_from(raw)
        .map_err(|_| JobError::invalid_record(line_no, line, format!("{} {} is negative", what, raw)))
}

fn parse_value(line_no: usize, line: &str, field: &str) -> Result<f64, JobError> {
    let value: f64 = field.parse().map_err(|_| {
        JobError::parse(line_no, line, format!("value {:?} is not a number", field))
    })?;
    if !value.is_finite() {
        return Err(JobError::parse(
            line_no,
            line,
            format!("value {:?} is not finite", field),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell() {
        let cell = parse_cell(1, "A,0,1,2,3,4.5").unwrap();
        assert_eq!(cell, Cell::new(Matrix::A, 0, 1, 2, 3, 4.5));

        // Whitespace around fields and a trailing newline are tolerated
        let cell = parse_cell(2, " B, 1, 0, 0, 1, -2 \n").unwrap();
        assert_eq!(cell, Cell::new(Matrix::B, 1, 0, 0, 1, -2.0));
    }

    #[test]
    fn test_parse_cell_errors() {
        let cases = vec![
            ("A,0,0,0,0", true),
            ("A,0,0,0,0,1,9", true),
            ("A,x,0,0,0,1", true),
            ("A,0,0,0,0,abc", true),
            ("A,0,0,0,0,NaN", true),
            ("A,0,0,0,0,inf", true),
            ("A,0,0,0,0,1.5e3", false),
        ];
        for (line, should_fail) in cases {
            let result = parse_cell(5, line);
            if should_fail {
                assert!(matches!(result, Err(JobError::Parse { line: 5, .. })), "expected parse error for {}", line);
            } else {
                assert!(result.is_ok(), "expected success for {}", line);
            }
        }
    }

    #[test]
    fn test_unknown_tag_and_negative_index() {
        assert!(matches!(parse_cell(1, "C,0,0,0,0,1"), Err(JobError::InvalidRecord { .. })));
        assert!(matches!(parse_cell(1, "A,-1,0,0,0,1"), Err(JobError::InvalidRecord { .. })));
    }

    #[test]
    fn test_routed_line_keeps_only_contraction_index() {
        let record = RoutedRecord {
            dest: OutputBlockKey::new(1, 3),
            payload: Cell::new(Matrix::A, 1, 2, 0, 1, 2.5),
        };
        assert_eq!(format_routed(&record), "1,3\tA,2,0,1,2.5");
        assert_eq!(parse_routed(1, "1,3\tA,2,0,1,2.5").unwrap(), record);

        let record = RoutedRecord {
            dest: OutputBlockKey::new(0, 4),
            payload: Cell::new(Matrix::B, 2, 4, 1, 1, -1.0),
        };
        assert_eq!(format_routed(&record), "0,4\tB,2,1,1,-1");
        assert_eq!(parse_routed(9, &format_routed(&record)).unwrap(), record);
    }

    #[test]
    fn test_routed_unknown_tag() {
        let err = parse_routed(4, "0,0\tX,0,0,0,1").unwrap_err();
        assert!(matches!(err, JobError::InvalidRecord { line: Some(4), .. }));
        assert!(matches!(parse_routed(4, "0,0 A,0,0,0,1"), Err(JobError::Parse { .. })));
    }

    #[test]
    fn test_output_formats() {
        let key = OutputBlockKey::new(1, 0);
        let cell = OutputCell { row: 0, col: 1, value: 43.0 };
        assert_eq!(format_output(&key, &cell), "1,0\t0,1,43");
        assert_eq!(parse_output(1, "1,0\t0,1,43").unwrap(), (key, cell));

        let json = format_output_json(&key, &cell).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["key"], serde_json::json!([1, 0]));
        assert_eq!(parsed["value"], serde_json::json!(43.0));
    }
}
