//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - price/event records (`PricePoint`, `Event`)
//! - modelling choices (`SeriesKind`, `Frequency`, `TauPrior`)
//! - posterior containers (`Draw`, `PosteriorSamples`)
//! - interpretation output and the dashboard artifact

pub mod types;

pub use types::*;
