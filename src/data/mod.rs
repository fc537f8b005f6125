/// Test data generation for the block multiplication job
pub mod generator;

pub use generator::{GeneratedPair, GeneratorParams, generate};
