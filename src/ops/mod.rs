// Map stage (fan-out routing)
pub mod route;

// Reduce stage (per-block local join + sparse accumulation)
pub mod combine;

// Dense reference product and reassembly, for verification
pub mod dense;

pub use combine::{JoinStrategy, combine, combine_with};
pub use route::{route, route_checked, route_into};
