use std::collections::HashMap;

use crate::core::types::{OutputBlockKey, RoutedRecord};

/// Regroups routed records by destination key
///
/// Implementations must hand back every record exactly once, and a group
/// only after all records have been seen. Order between and within groups
/// is unspecified; the reduce stage does not rely on it.
pub trait Shuffle {
    fn group(&self, records: Vec<RoutedRecord>) -> Vec<(OutputBlockKey, Vec<RoutedRecord>)>;
}

/// In-memory shuffle backed by a `HashMap` keyed by output block
#[derive(Debug, Default, Clone, Copy)]
pub struct HashShuffle;

impl Shuffle for HashShuffle {
    fn group(&self, records: Vec<RoutedRecord>) -> Vec<(OutputBlockKey, Vec<RoutedRecord>)> {
        let mut groups: HashMap<OutputBlockKey, Vec<RoutedRecord>> = HashMap::new();
        for record in records {
            groups.entry(record.dest).or_default().push(record);
        }
        groups.into_iter().collect()
    }
}
