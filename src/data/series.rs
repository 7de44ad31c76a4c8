//! Series transforms applied before modelling.
//!
//! - daily log-returns from prices
//! - weekly (Monday–Sunday) averaging, labelled with the week's Sunday
//! - selection of the modelled quantity (`ModelSeries`)

use chrono::{Datelike, Duration, NaiveDate};

use crate::domain::{Frequency, ModelSeries, PricePoint, PriceSeries, SeriesKind};
use crate::error::AppError;
use crate::math::{mean, population_std};

/// `ln(p[t] / p[t-1])`; `None` for the first element or when either price is non-positive.
pub fn log_returns(prices: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(prices.len());
    for (i, &p) in prices.iter().enumerate() {
        let r = match i.checked_sub(1).map(|j| prices[j]) {
            Some(prev) if prev > 0.0 && p > 0.0 => Some((p / prev).ln()),
            _ => None,
        };
        out.push(r);
    }
    out
}

/// Sunday ending the calendar week that contains `date`.
pub fn week_ending(date: NaiveDate) -> NaiveDate {
    let days_to_sunday = 6 - date.weekday().num_days_from_monday() as i64;
    date + Duration::days(days_to_sunday)
}

/// Average prices and defined log-returns per calendar week.
///
/// Weeks where no log-return is defined get `log_return: None`; the caller
/// drops them when modelling returns. Weeks are emitted in date order.
pub fn resample_weekly(series: &PriceSeries) -> Vec<PricePoint> {
    let mut out = Vec::new();
    let mut i = 0;
    let points = &series.points;
    while i < points.len() {
        let label = week_ending(points[i].date);
        let mut prices = Vec::new();
        let mut returns = Vec::new();
        while i < points.len() && week_ending(points[i].date) == label {
            prices.push(points[i].price);
            if let Some(r) = points[i].log_return {
                returns.push(r);
            }
            i += 1;
        }
        if let Some(price) = mean(&prices) {
            out.push(PricePoint {
                date: label,
                price,
                log_return: mean(&returns),
            });
        }
    }
    out
}

/// Pick the modelled quantity at the requested frequency.
///
/// Undefined log-returns are dropped, so `dates[i]` always pairs with `values[i]`.
pub fn to_model_series(
    series: &PriceSeries,
    kind: SeriesKind,
    frequency: Frequency,
) -> Result<ModelSeries, AppError> {
    let points = match frequency {
        Frequency::Daily => series.points.clone(),
        Frequency::Weekly => resample_weekly(series),
    };

    let (dates, values): (Vec<NaiveDate>, Vec<f64>) = points
        .iter()
        .filter_map(|p| match kind {
            SeriesKind::LogReturns => p.log_return.map(|r| (p.date, r)),
            SeriesKind::Price => Some((p.date, p.price)),
        })
        .unzip();

    if values.len() < 2 {
        return Err(AppError::InsufficientData(format!(
            "Only {} modelled observations after transforms; need at least 2.",
            values.len()
        )));
    }

    Ok(ModelSeries {
        kind,
        frequency,
        dates,
        values,
    })
}

/// Descriptive statistics of a modelled series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStats {
    pub n: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

impl SeriesStats {
    pub fn compute(series: &ModelSeries) -> Option<Self> {
        let mean = mean(&series.values)?;
        let std = population_std(&series.values)?;
        let min = series.values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = series.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            n: series.len(),
            mean,
            std,
            min,
            max,
            first_date: *series.dates.first()?,
            last_date: *series.dates.last()?,
        })
    }
}
