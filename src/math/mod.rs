//! Mathematical utilities: summary statistics and log-densities.

pub mod density;
pub mod stats;

pub use density::*;
pub use stats::*;
