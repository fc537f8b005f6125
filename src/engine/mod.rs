// Execution engine: the in-process driver and the line-filter phases
// an external map/reduce runtime can drive instead
pub mod pipeline;
pub mod shuffle;
pub mod streaming;

pub use pipeline::{JobOutput, JobStats, Pipeline};
pub use shuffle::{HashShuffle, Shuffle};
pub use streaming::{map_stream, reduce_stream};
