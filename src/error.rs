//! Application error type.
//!
//! Every fallible stage returns `AppError`. Errors are never retried: they
//! propagate with `?` up to `main`, which prints the message and exits with
//! the variant's exit code.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// A required input file (or the served artifact) does not exist.
    #[error("{what} not found at '{}'", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    /// Required columns/keys are missing from an input document.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A value could not be parsed after exhausting every accepted format.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid configuration or argument combination.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Not enough usable data left to run the requested stage.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Non-finite densities, failed step-size search, and similar.
    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Server error: {0}")]
    Server(String),
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::NotFound { .. }
            | AppError::Schema(_)
            | AppError::Parse(_)
            | AppError::InvalidInput(_)
            | AppError::Csv(_)
            | AppError::Json(_) => 2,
            AppError::InsufficientData(_) => 3,
            AppError::Numerical(_) => 4,
            AppError::Io { .. } => 5,
            AppError::Server(_) => 6,
        }
    }
}
