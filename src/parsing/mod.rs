/// Text codecs for input, intermediate and output records
pub mod record;

pub use record::{
    OutputFormat, format_cell, format_output, format_output_as, format_output_json, format_routed,
    parse_cell, parse_output, parse_routed,
};
