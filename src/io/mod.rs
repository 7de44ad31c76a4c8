//! Input/output helpers.
//!
//! - raw price CSV ingest + cleaning (`ingest`)
//! - event table CSV (`events`)
//! - dashboard JSON + trace CSV exports (`export`)

use std::path::Path;

use crate::error::AppError;

pub mod events;
pub mod export;
pub mod ingest;

pub use events::*;
pub use export::*;
pub use ingest::*;

/// Create the parent directory of `path` if it does not exist yet.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), AppError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|e| AppError::io(dir, e))
        }
        _ => Ok(()),
    }
}
