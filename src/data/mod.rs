//! In-memory data preparation.
//!
//! - `series`: log-returns, weekly resampling, selection of the modelled series
//! - `synthetic`: seeded price data with a known shift (for `bcp synth`)

pub mod series;
pub mod synthetic;

pub use series::*;
pub use synthetic::{SynthConfig, SyntheticData, generate, write_synthetic};
