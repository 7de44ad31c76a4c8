//! Raw price CSV ingest and cleaning.
//!
//! Turns a daily price export (`Date,Price`, as distributed by the EIA and
//! re-shared on data portals) into a `PriceSeries` that is safe to model:
//!
//! - **Strict schema**: `Date` and `Price` columns are required (exit code 2)
//! - **Strict dates**: an unparseable date fails the load, naming the line
//! - **Lenient prices**: non-numeric cells become gaps and are forward-filled
//! - **Deterministic**: stable sort, first-row-wins on duplicate dates

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::data::series::log_returns;
use crate::domain::{PricePoint, PriceSeries};
use crate::error::AppError;

/// What happened while cleaning the raw file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_read: usize,
    /// Interior gaps filled from the previous price.
    pub filled: usize,
    /// Rows before the first valid price (nothing to fill from).
    pub dropped_leading: usize,
    /// Rows discarded because an earlier row had the same date.
    pub duplicates: usize,
}

#[derive(Debug)]
struct RawRow {
    line: usize,
    date: NaiveDate,
    price: Option<f64>,
}

/// Load, sort, de-duplicate and forward-fill a raw price file.
pub fn load_price_series(path: &Path) -> Result<(PriceSeries, LoadReport), AppError> {
    if !path.exists() {
        return Err(AppError::NotFound {
            what: "Price file",
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path).map_err(|e| AppError::io(path, e))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader.headers()?.clone();
    let header_map = build_header_map(&headers);
    let date_idx = require_column(&header_map, "date", "Date", path)?;
    let price_idx = require_column(&header_map, "price", "Price", path)?;

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        let record = result?;

        let raw_date = record.get(date_idx).unwrap_or("").trim();
        if raw_date.is_empty() {
            return Err(AppError::Parse(format!("Missing date on line {line}.")));
        }
        let date = parse_date(raw_date).map_err(|msg| AppError::Parse(format!("{msg} (line {line})")))?;
        let price = record.get(price_idx).and_then(parse_price);

        rows.push(RawRow { line, date, price });
    }

    let rows_read = rows.len();
    let (series, mut report) = clean_rows(rows)?;
    report.rows_read = rows_read;

    info!(
        path = %path.display(),
        rows = report.rows_read,
        kept = series.len(),
        filled = report.filled,
        dropped_leading = report.dropped_leading,
        duplicates = report.duplicates,
        "loaded price series"
    );
    Ok((series, report))
}

fn clean_rows(mut rows: Vec<RawRow>) -> Result<(PriceSeries, LoadReport), AppError> {
    let mut report = LoadReport::default();

    // Stable: equal dates keep file order, so the first occurrence wins below.
    rows.sort_by_key(|r| r.date);

    let mut unique: Vec<RawRow> = Vec::with_capacity(rows.len());
    for row in rows {
        if unique.last().is_some_and(|prev| prev.date == row.date) {
            debug!(date = %row.date, line = row.line, "dropping duplicate date");
            report.duplicates += 1;
            continue;
        }
        unique.push(row);
    }

    let mut dates = Vec::with_capacity(unique.len());
    let mut prices = Vec::with_capacity(unique.len());
    let mut last: Option<f64> = None;
    for row in unique {
        match (row.price, last) {
            (Some(p), _) => {
                last = Some(p);
                dates.push(row.date);
                prices.push(p);
            }
            (None, Some(prev)) => {
                report.filled += 1;
                dates.push(row.date);
                prices.push(prev);
            }
            (None, None) => {
                report.dropped_leading += 1;
            }
        }
    }

    if report.dropped_leading > 0 {
        warn!(rows = report.dropped_leading, "dropped leading rows without a price");
    }
    if prices.is_empty() {
        return Err(AppError::InsufficientData(
            "Price file contains no valid prices.".to_string(),
        ));
    }

    let returns = log_returns(&prices);
    let points = dates
        .into_iter()
        .zip(prices)
        .zip(returns)
        .map(|((date, price), log_return)| PricePoint {
            date,
            price,
            log_return,
        })
        .collect();

    Ok((PriceSeries { points }, report))
}

/// Write the cleaned series as `Date,Price,Log_Returns`.
pub fn write_cleaned_csv(path: &Path, series: &PriceSeries) -> Result<(), AppError> {
    crate::io::ensure_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Date", "Price", "Log_Returns"])?;
    for p in &series.points {
        writer.write_record([
            p.date.format("%Y-%m-%d").to_string(),
            p.price.to_string(),
            p.log_return.map(|r| r.to_string()).unwrap_or_default(),
        ])?;
    }
    writer.flush().map_err(|e| AppError::io(path, e))?;
    info!(path = %path.display(), rows = series.len(), "wrote cleaned prices");
    Ok(())
}

pub(crate) fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

pub(crate) fn require_column(
    header_map: &HashMap<String, usize>,
    key: &str,
    display: &str,
    path: &Path,
) -> Result<usize, AppError> {
    header_map.get(key).copied().ok_or_else(|| {
        AppError::Schema(format!(
            "Missing required column `{display}` in '{}'.",
            path.display()
        ))
    })
}

/// Parse a calendar date.
///
/// The EIA-style formats are tried first, in order (`04-Jan-21`,
/// `Jan 04, 2021`, `2021-01-04`), then a handful of common fallbacks.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const PRIMARY: [&str; 3] = ["%d-%b-%y", "%b %d, %Y", "%Y-%m-%d"];
    const FALLBACK: [&str; 7] = [
        "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%d %b %Y", "%B %d, %Y", "%d-%b-%Y", "%Y%m%d",
    ];

    let s = s.trim();
    for fmt in PRIMARY.iter().chain(FALLBACK.iter()) {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    Err(format!(
        "Invalid date '{s}'. Expected e.g. 04-Jan-21, Jan 04, 2021, or 2021-01-04."
    ))
}

fn parse_price(s: &str) -> Option<f64> {
    let s = s.trim().replace(',', "");
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
