//! Terminal reporting for analysis runs.

pub mod format;

pub use format::*;
