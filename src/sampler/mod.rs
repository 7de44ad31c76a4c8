//! Posterior sampling for the change-point model.
//!
//! Each chain iteration is a compound step:
//! - `TauMetropolis` moves the discrete switch index
//! - `Nuts` moves `(μ₁, μ₂, ln σ)` with τ held fixed
//!
//! `runner` drives the chains in parallel; `diagnostics` summarizes mixing.

pub mod adapt;
pub mod diagnostics;
pub mod metropolis;
pub mod nuts;
pub mod runner;
pub mod step;

pub use diagnostics::{Diagnostics, ParamDiagnostics, diagnose, ess, split_rhat};
pub use metropolis::TauMetropolis;
pub use nuts::Nuts;
pub use runner::sample_posterior;
pub use step::{ChainState, CompoundStep, SamplingStep, StepStats};
