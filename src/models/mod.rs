//! Probabilistic models.
//!
//! Models expose log-densities (and gradients) as plain methods so the
//! sampler code can stay model-agnostic at the step level.

pub mod changepoint;

pub use changepoint::*;
