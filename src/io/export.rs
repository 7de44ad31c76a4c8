//! Dashboard artifact and posterior trace exports.
//!
//! The dashboard JSON is the only hand-off between the batch pipeline and the
//! API server: `{"prices": [...], "change_point": {...}}`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::domain::{DashboardDocument, PosteriorSamples};
use crate::error::AppError;
use crate::io::ensure_parent_dir;

/// Write the dashboard document as pretty-printed JSON.
pub fn write_dashboard_json(path: &Path, doc: &DashboardDocument) -> Result<(), AppError> {
    ensure_parent_dir(path)?;
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, doc)?;
    writer.write_all(b"\n").map_err(|e| AppError::io(path, e))?;
    writer.flush().map_err(|e| AppError::io(path, e))?;

    info!(path = %path.display(), prices = doc.prices.len(), "wrote dashboard artifact");
    Ok(())
}

/// Read a dashboard document back (typed).
pub fn read_dashboard_json(path: &Path) -> Result<DashboardDocument, AppError> {
    if !path.exists() {
        return Err(AppError::NotFound {
            what: "Dashboard data",
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path).map_err(|e| AppError::io(path, e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Write every retained draw as `chain,draw,tau,mu_1,mu_2,sigma`.
pub fn write_trace_csv(path: &Path, samples: &PosteriorSamples) -> Result<(), AppError> {
    ensure_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["chain", "draw", "tau", "mu_1", "mu_2", "sigma"])?;
    for chain in &samples.chains {
        for (i, d) in chain.draws.iter().enumerate() {
            writer.write_record([
                chain.chain.to_string(),
                i.to_string(),
                d.tau.to_string(),
                d.mu_1.to_string(),
                d.mu_2.to_string(),
                d.sigma.to_string(),
            ])?;
        }
    }
    writer.flush().map_err(|e| AppError::io(path, e))?;

    info!(path = %path.display(), draws = samples.len(), "wrote posterior trace");
    Ok(())
}
