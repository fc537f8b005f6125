// Data model, block coordinate arithmetic and the error taxonomy
pub mod coords;
pub mod error;
pub mod types;

pub use coords::BlockLayout;
pub use error::JobError;
pub use types::{Cell, GridConfig, Matrix, OutputBlockKey, OutputCell, RoutedRecord};
