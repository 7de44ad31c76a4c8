//! Turning a posterior into a dated, event-labelled change point.

use chrono::NaiveDate;

use crate::domain::{ChangePointResult, Event, EventTable, Impact, ModelSeries, Param, PosteriorSamples, SeriesKind};
use crate::error::AppError;
use crate::math::{mean, quantile, round_to, sample_variance};

/// Posterior mean of τ truncated to an integer and clamped to `n - 1`.
pub fn tau_point_estimate(samples: &PosteriorSamples, n: usize) -> Result<usize, AppError> {
    if n == 0 {
        return Err(AppError::InsufficientData("Modelled series is empty.".to_string()));
    }
    let tau = samples
        .mean(Param::Tau)
        .ok_or_else(|| AppError::InsufficientData("Posterior has no draws.".to_string()))?;
    if !tau.is_finite() {
        return Err(AppError::Numerical("Posterior mean of tau is not finite.".to_string()));
    }
    Ok((tau.trunc().max(0.0) as usize).min(n - 1))
}

/// Event closest to `date` by absolute day distance; ties keep the earlier table row.
pub fn nearest_event(events: &EventTable, date: NaiveDate) -> Option<&Event> {
    let mut best: Option<(&Event, i64)> = None;
    for e in &events.events {
        let distance = (e.start_date - date).num_days().abs();
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((e, distance));
        }
    }
    best.map(|(e, _)| e)
}

/// Change date, nearest event and regime-shift magnitude.
pub fn interpret(
    samples: &PosteriorSamples,
    series: &ModelSeries,
    events: &EventTable,
) -> Result<ChangePointResult, AppError> {
    let idx = tau_point_estimate(samples, series.len())?;
    let change_point_date = series.dates[idx];

    let event = nearest_event(events, change_point_date).ok_or_else(|| {
        AppError::InsufficientData("Event table is empty; cannot associate the change point.".to_string())
    })?;

    let mu_1 = samples
        .mean(Param::Mu1)
        .ok_or_else(|| AppError::InsufficientData("Posterior has no draws.".to_string()))?;
    let mu_2 = samples
        .mean(Param::Mu2)
        .ok_or_else(|| AppError::InsufficientData("Posterior has no draws.".to_string()))?;
    let magnitude = mu_2 - mu_1;
    if !magnitude.is_finite() {
        return Err(AppError::Numerical("Regime means are not finite.".to_string()));
    }

    let impact = match series.kind {
        SeriesKind::LogReturns => Impact::LogReturn {
            log_return_change: round_to(magnitude, 4),
        },
        SeriesKind::Price => {
            if mu_1 == 0.0 {
                return Err(AppError::Numerical(
                    "First-regime mean price is zero; percent change undefined.".to_string(),
                ));
            }
            Impact::Price {
                price_change_usd: round_to(magnitude, 2),
                percent_change: round_to(magnitude / mu_1 * 100.0, 2),
            }
        }
    };

    Ok(ChangePointResult {
        change_point_date,
        associated_event: event.name.clone(),
        event_date: event.start_date,
        event_description: event.description.clone(),
        impact,
    })
}

/// Mean, standard deviation and central 95% interval of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSummary {
    pub param: Param,
    pub mean: f64,
    pub sd: f64,
    pub q025: f64,
    pub q975: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PosteriorSummary {
    pub params: Vec<ParamSummary>,
}

impl PosteriorSummary {
    pub fn from_samples(samples: &PosteriorSamples) -> Option<Self> {
        let params = Param::ALL
            .iter()
            .map(|&param| {
                let values: Vec<f64> = samples.draws().map(|d| param.value(d)).collect();
                Some(ParamSummary {
                    param,
                    mean: mean(&values)?,
                    sd: sample_variance(&values).map(f64::sqrt).unwrap_or(0.0),
                    q025: quantile(&values, 0.025)?,
                    q975: quantile(&values, 0.975)?,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self { params })
    }

    pub fn get(&self, param: Param) -> Option<&ParamSummary> {
        self.params.iter().find(|p| p.param == param)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChainStats, ChainTrace, Draw, Frequency};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn samples(draws: Vec<Draw>) -> PosteriorSamples {
        PosteriorSamples {
            chains: vec![ChainTrace {
                chain: 0,
                draws,
                stats: ChainStats::default(),
            }],
        }
    }

    fn draw(tau: usize, mu_1: f64, mu_2: f64) -> Draw {
        Draw { tau, mu_1, mu_2, sigma: 1.0 }
    }

    fn daily(kind: SeriesKind, n: usize) -> ModelSeries {
        ModelSeries {
            kind,
            frequency: Frequency::Daily,
            dates: (0..n).map(|i| ymd(2020, 1, 1) + chrono::Duration::days(i as i64)).collect(),
            values: vec![0.0; n],
        }
    }

    fn event(date: NaiveDate, name: &str) -> Event {
        Event {
            start_date: date,
            name: name.to_string(),
            description: format!("{name} description"),
        }
    }

    #[test]
    fn tau_estimate_truncates_and_clamps() {
        let s = samples(vec![draw(3, 0.0, 0.0), draw(4, 0.0, 0.0)]);
        assert_eq!(tau_point_estimate(&s, 10).unwrap(), 3);
        let s = samples(vec![draw(50, 0.0, 0.0)]);
        assert_eq!(tau_point_estimate(&s, 10).unwrap(), 9);
        assert!(tau_point_estimate(&samples(vec![]), 10).is_err());
    }

    #[test]
    fn equidistant_events_keep_table_order() {
        let target = ymd(2020, 3, 10);
        let table = EventTable {
            events: vec![event(ymd(2020, 3, 15), "later"), event(ymd(2020, 3, 5), "earlier")],
        };
        assert_eq!(nearest_event(&table, target).unwrap().name, "later");
        assert!(nearest_event(&EventTable::default(), target).is_none());
    }

    #[test]
    fn log_return_impact_is_rounded() {
        let series = daily(SeriesKind::LogReturns, 100);
        let s = samples(vec![draw(50, 0.001, 0.10124), draw(50, -0.001, 0.09988)]);
        let table = EventTable {
            events: vec![event(ymd(2019, 1, 1), "far"), event(series.dates[50], "near")],
        };
        let result = interpret(&s, &series, &table).unwrap();
        assert_eq!(result.change_point_date, series.dates[50]);
        assert_eq!(result.associated_event, "near");
        assert_eq!(result.event_date, series.dates[50]);
        assert_eq!(result.event_description, "near description");
        assert_eq!(result.impact, Impact::LogReturn { log_return_change: 0.1006 });
    }

    #[test]
    fn price_impact_has_percent_change() {
        let series = daily(SeriesKind::Price, 20);
        let s = samples(vec![draw(10, 60.0, 75.0)]);
        let table = EventTable {
            events: vec![event(ymd(2020, 1, 11), "shock")],
        };
        let result = interpret(&s, &series, &table).unwrap();
        assert_eq!(
            result.impact,
            Impact::Price {
                price_change_usd: 15.0,
                percent_change: 25.0
            }
        );
    }

    #[test]
    fn empty_event_table_fails() {
        let series = daily(SeriesKind::LogReturns, 10);
        let s = samples(vec![draw(5, 0.0, 1.0)]);
        assert!(matches!(
            interpret(&s, &series, &EventTable::default()),
            Err(AppError::InsufficientData(_))
        ));
    }

    #[test]
    fn summary_has_every_parameter() {
        let s = samples((0..41).map(|i| draw(i, i as f64, 1.0)).collect());
        let summary = PosteriorSummary::from_samples(&s).unwrap();
        assert_eq!(summary.params.len(), 4);
        let mu_1 = summary.get(Param::Mu1).unwrap();
        assert_eq!(mu_1.mean, 20.0);
        assert!((mu_1.q025 - 1.0).abs() < 1e-12);
        assert!((mu_1.q975 - 39.0).abs() < 1e-12);
        assert_eq!(summary.get(Param::Mu2).unwrap().sd, 0.0);
        assert!(PosteriorSummary::from_samples(&samples(vec![])).is_none());
    }
}
