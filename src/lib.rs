//! `brent-changepoint` library crate.
//!
//! The binary (`bcp`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the pipeline and the API server share one set of types
//! - code stays easy to navigate as the project grows

pub mod analysis;
pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod sampler;
pub mod server;
