//! Shared analysis pipeline.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load prices -> select modelled series -> build model -> sample -> diagnose -> interpret
//!
//! The command handlers can then focus on presentation and exports.

use tracing::info;

use crate::analysis::{PosteriorSummary, interpret};
use crate::data::{SeriesStats, to_model_series};
use crate::domain::{
    AnalyzeConfig, ChangePointResult, DashboardDocument, EventTable, ModelSeries, PosteriorSamples, PriceSeries,
};
use crate::error::AppError;
use crate::io::{LoadReport, load_event_table, load_price_series};
use crate::models::ChangePointModel;
use crate::sampler::{Diagnostics, diagnose, sample_posterior};

/// All computed outputs of a single `bcp analyze` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub load: LoadReport,
    pub prices: PriceSeries,
    pub model_series: ModelSeries,
    pub stats: SeriesStats,
    pub tau_candidates: usize,
    pub samples: PosteriorSamples,
    pub summary: PosteriorSummary,
    pub diagnostics: Diagnostics,
    pub result: ChangePointResult,
}

impl RunOutput {
    /// The artifact served by the API: daily cleaned prices plus the change point.
    pub fn document(&self) -> DashboardDocument {
        DashboardDocument {
            prices: self.prices.points.clone(),
            change_point: self.result.clone(),
        }
    }

    /// Index of the estimated change into `model_series`.
    pub fn change_index(&self) -> usize {
        self.model_series
            .dates
            .iter()
            .position(|d| *d == self.result.change_point_date)
            .unwrap_or(0)
    }
}

/// Execute the full pipeline from the files named in `config`.
pub fn run_analysis(config: &AnalyzeConfig) -> Result<RunOutput, AppError> {
    let (prices, load) = load_price_series(&config.prices_path)?;
    let events = load_event_table(&config.events_path)?;
    run_analysis_on_series(prices, load, &events, config)
}

/// Execute the pipeline on an already-loaded price series.
pub fn run_analysis_on_series(
    prices: PriceSeries,
    load: LoadReport,
    events: &EventTable,
    config: &AnalyzeConfig,
) -> Result<RunOutput, AppError> {
    if events.events.is_empty() {
        return Err(AppError::InsufficientData(
            "Event table is empty; cannot associate the change point.".to_string(),
        ));
    }

    let model_series = to_model_series(&prices, config.series_kind, config.frequency)?;
    let stats = SeriesStats::compute(&model_series)
        .ok_or_else(|| AppError::InsufficientData("Modelled series is empty.".to_string()))?;

    let model = ChangePointModel::build(&model_series.values, config.series_kind, config.tau_prior)?;
    info!(
        n = model.n(),
        tau_candidates = model.tau_grid().len(),
        scale = model.scale(),
        "built change-point model"
    );

    let init = model.default_initial_values();
    let samples = sample_posterior(&model, &config.sampler, &init)?;
    let diagnostics = diagnose(&samples);
    let summary = PosteriorSummary::from_samples(&samples)
        .ok_or_else(|| AppError::InsufficientData("Posterior has no draws.".to_string()))?;

    let result = interpret(&samples, &model_series, events)?;
    info!(
        change_point = %result.change_point_date,
        event = %result.associated_event,
        "interpreted change point"
    );

    Ok(RunOutput {
        load,
        prices,
        model_series,
        stats,
        tau_candidates: model.tau_grid().len(),
        samples,
        summary,
        diagnostics,
        result,
    })
}
