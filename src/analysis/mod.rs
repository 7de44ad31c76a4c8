//! Posterior interpretation.

pub mod interpret;

pub use interpret::*;
