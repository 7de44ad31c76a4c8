//! Seeded synthetic price data with a known regime shift.
//!
//! Used by `bcp synth` to produce a raw price file and a matching one-entry
//! event table, so the whole pipeline can be exercised without real data.
//! Prices follow a geometric random walk on business days whose mean daily
//! log-return jumps from `drift_before` to `drift_after` at `shift_index`.

use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use tracing::info;

use crate::error::AppError;
use crate::io::ensure_parent_dir;

#[derive(Debug, Clone, PartialEq)]
pub struct SynthConfig {
    pub start: NaiveDate,
    /// Number of business days to generate.
    pub days: usize,
    /// Index of the first day of the second regime.
    pub shift_index: usize,
    pub start_price: f64,
    pub drift_before: f64,
    pub drift_after: f64,
    /// Daily log-return volatility.
    pub volatility: f64,
    pub seed: u64,
    pub event_name: String,
    pub event_description: String,
}

#[derive(Debug, Clone)]
pub struct SyntheticData {
    pub dates: Vec<NaiveDate>,
    pub prices: Vec<f64>,
    /// Date of the first second-regime observation.
    pub shift_date: NaiveDate,
}

pub fn generate(config: &SynthConfig) -> Result<SyntheticData, AppError> {
    if config.days < 2 {
        return Err(AppError::InvalidInput("Synthetic series needs at least 2 days.".to_string()));
    }
    if config.shift_index == 0 || config.shift_index >= config.days {
        return Err(AppError::InvalidInput(format!(
            "Shift index must be in 1..{}, got {}.",
            config.days, config.shift_index
        )));
    }
    if !(config.start_price.is_finite() && config.start_price > 0.0) {
        return Err(AppError::InvalidInput("Start price must be > 0.".to_string()));
    }
    let noise = Normal::new(0.0, config.volatility)
        .map_err(|e| AppError::InvalidInput(format!("Invalid volatility: {e}")))?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let dates = business_days(config.start, config.days);
    let mut prices = Vec::with_capacity(config.days);
    let mut price = config.start_price;
    prices.push(price);
    for t in 1..config.days {
        let drift = if t < config.shift_index {
            config.drift_before
        } else {
            config.drift_after
        };
        price *= (drift + noise.sample(&mut rng)).exp();
        prices.push(price);
    }

    let shift_date = dates[config.shift_index];
    Ok(SyntheticData {
        dates,
        prices,
        shift_date,
    })
}

/// Write the raw price file (`Date,Price`, `Jan 04, 2021` style dates) and
/// a one-row event table dated at the shift.
pub fn write_synthetic(
    data: &SyntheticData,
    config: &SynthConfig,
    prices_out: &Path,
    events_out: &Path,
) -> Result<(), AppError> {
    ensure_parent_dir(prices_out)?;
    let mut writer = csv::Writer::from_path(prices_out)?;
    writer.write_record(["Date", "Price"])?;
    for (date, price) in data.dates.iter().zip(&data.prices) {
        writer.write_record([date.format("%b %d, %Y").to_string(), format!("{price:.2}")])?;
    }
    writer.flush().map_err(|e| AppError::io(prices_out, e))?;

    ensure_parent_dir(events_out)?;
    let mut writer = csv::Writer::from_path(events_out)?;
    writer.write_record(["Start Date", "Event Name", "Description"])?;
    writer.write_record([
        data.shift_date.format("%Y-%m-%d").to_string(),
        config.event_name.clone(),
        config.event_description.clone(),
    ])?;
    writer.flush().map_err(|e| AppError::io(events_out, e))?;

    info!(
        prices = %prices_out.display(),
        events = %events_out.display(),
        days = data.prices.len(),
        shift_date = %data.shift_date,
        "wrote synthetic data"
    );
    Ok(())
}

fn business_days(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(count);
    let mut d = start;
    while out.len() < count {
        if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(d);
        }
        d += Duration::days(1);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SynthConfig {
        SynthConfig {
            start: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            days: 30,
            shift_index: 12,
            start_price: 60.0,
            drift_before: 0.0,
            drift_after: 0.01,
            volatility: 0.005,
            seed: 42,
            event_name: "Synthetic shock".to_string(),
            event_description: "Known drift change".to_string(),
        }
    }

    #[test]
    fn same_seed_same_series() {
        let a = generate(&config()).unwrap();
        let b = generate(&config()).unwrap();
        assert_eq!(a.prices, b.prices);
        assert_eq!(a.dates.len(), 30);
        assert!(a.dates.iter().all(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)));
        // 2021-01-01 is a Friday.
        assert_eq!(a.dates[1], NaiveDate::from_ymd_opt(2021, 1, 4).unwrap());
        assert_eq!(a.shift_date, a.dates[12]);
    }

    #[test]
    fn rejects_out_of_range_shift() {
        let bad = SynthConfig { shift_index: 30, ..config() };
        assert!(matches!(generate(&bad), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn written_files_load_back() {
        let dir = std::env::temp_dir().join(format!("bcp-synth-{}", std::process::id()));
        let prices = dir.join("raw.csv");
        let events = dir.join("events.csv");
        let data = generate(&config()).unwrap();
        write_synthetic(&data, &config(), &prices, &events).unwrap();

        let (series, _) = crate::io::load_price_series(&prices).unwrap();
        assert_eq!(series.len(), 30);
        let table = crate::io::load_event_table(&events).unwrap();
        assert_eq!(table.events[0].start_date, data.shift_date);
        std::fs::remove_dir_all(&dir).ok();
    }
}
