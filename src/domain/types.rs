//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during sampling
//! - exported to the dashboard JSON artifact
//! - reloaded later by the API or by tests

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One cleaned daily observation.
///
/// Field names follow the dashboard wire format (`Date`, `Price`, `Log_Returns`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Price")]
    pub price: f64,
    /// `ln(price_t / price_{t-1})`; `None` for the first record.
    #[serde(rename = "Log_Returns")]
    pub log_return: Option<f64>,
}

/// Chronologically sorted price series with unique dates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

/// A known macro/geopolitical event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub start_date: NaiveDate,
    pub name: String,
    pub description: String,
}

/// Events in file order. The order matters: it breaks distance ties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    pub events: Vec<Event>,
}

/// Which quantity the change-point model is fitted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SeriesKind {
    /// Daily (or weekly-averaged) log-returns.
    LogReturns,
    /// Raw prices (USD).
    Price,
}

/// Sampling frequency of the modelled series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    /// Calendar weeks ending Sunday, averaged.
    Weekly,
}

/// Prior over the switch index τ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TauPrior {
    /// Discrete uniform over every index `0..n`.
    Full,
    /// Categorical over `n / block` candidates; τ = index × block.
    ///
    /// Cuts the discrete search space by `block` at the cost of resolution.
    Blocked { block: usize },
}

impl TauPrior {
    pub fn block(self) -> usize {
        match self {
            TauPrior::Full => 1,
            TauPrior::Blocked { block } => block,
        }
    }
}

/// The observations actually handed to the model (after transforms).
#[derive(Debug, Clone)]
pub struct ModelSeries {
    pub kind: SeriesKind,
    pub frequency: Frequency,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl ModelSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A model parameter, used to pull columns out of a posterior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Tau,
    Mu1,
    Mu2,
    Sigma,
}

impl Param {
    pub const ALL: [Param; 4] = [Param::Tau, Param::Mu1, Param::Mu2, Param::Sigma];

    pub fn name(self) -> &'static str {
        match self {
            Param::Tau => "tau",
            Param::Mu1 => "mu_1",
            Param::Mu2 => "mu_2",
            Param::Sigma => "sigma",
        }
    }

    pub fn value(self, draw: &Draw) -> f64 {
        match self {
            Param::Tau => draw.tau as f64,
            Param::Mu1 => draw.mu_1,
            Param::Mu2 => draw.mu_2,
            Param::Sigma => draw.sigma,
        }
    }
}

/// One retained posterior draw. `tau` is in time-step units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Draw {
    pub tau: usize,
    pub mu_1: f64,
    pub mu_2: f64,
    pub sigma: f64,
}

/// Per-chain sampler statistics (post warm-up).
#[derive(Debug, Clone, Default)]
pub struct ChainStats {
    pub divergences: usize,
    pub mean_tree_depth: f64,
    /// Mean NUTS acceptance statistic.
    pub nuts_accept: f64,
    /// Fraction of accepted τ proposals.
    pub tau_accept: f64,
    /// Adapted NUTS step size.
    pub step_size: f64,
}

#[derive(Debug, Clone)]
pub struct ChainTrace {
    pub chain: usize,
    pub draws: Vec<Draw>,
    pub stats: ChainStats,
}

/// Retained draws of every chain, ordered by chain index.
#[derive(Debug, Clone)]
pub struct PosteriorSamples {
    pub chains: Vec<ChainTrace>,
}

impl PosteriorSamples {
    /// Total retained draws (`chains × draws`).
    pub fn len(&self) -> usize {
        self.chains.iter().map(|c| c.draws.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn draws(&self) -> impl Iterator<Item = &Draw> + '_ {
        self.chains.iter().flat_map(|c| c.draws.iter())
    }

    /// Per-chain columns for one parameter.
    pub fn chain_columns(&self, param: Param) -> Vec<Vec<f64>> {
        self.chains
            .iter()
            .map(|c| c.draws.iter().map(|d| param.value(d)).collect())
            .collect()
    }

    /// Mean over all retained draws (`None` if empty).
    pub fn mean(&self, param: Param) -> Option<f64> {
        let n = self.len();
        if n == 0 {
            return None;
        }
        Some(self.draws().map(|d| param.value(d)).sum::<f64>() / n as f64)
    }

    pub fn total_divergences(&self) -> usize {
        self.chains.iter().map(|c| c.stats.divergences).sum()
    }
}

/// Estimated impact of the change, in the units of the modelled series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Impact {
    Price {
        price_change_usd: f64,
        percent_change: f64,
    },
    LogReturn {
        log_return_change: f64,
    },
}

/// Interpretation of a posterior: change date, nearest event, and impact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePointResult {
    pub change_point_date: NaiveDate,
    pub associated_event: String,
    pub event_date: NaiveDate,
    pub event_description: String,
    #[serde(flatten)]
    pub impact: Impact,
}

/// The artifact consumed by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardDocument {
    pub prices: Vec<PricePoint>,
    pub change_point: ChangePointResult,
}

/// Sampler tuning knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    pub draws: usize,
    pub tune: usize,
    pub chains: usize,
    pub target_accept: f64,
    pub seed: u64,
    pub max_tree_depth: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            draws: 250,
            tune: 5000,
            chains: 4,
            target_accept: 0.95,
            seed: 42,
            max_tree_depth: 10,
        }
    }
}

/// A full `bcp analyze` run as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct AnalyzeConfig {
    pub prices_path: PathBuf,
    pub events_path: PathBuf,
    pub output_path: PathBuf,

    pub series_kind: SeriesKind,
    pub frequency: Frequency,
    pub tau_prior: TauPrior,
    pub sampler: SamplerConfig,

    pub trace_out: Option<PathBuf>,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
}

/// `bcp serve` settings.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub data_path: PathBuf,
    pub addr: String,
    pub cors_origin: String,
}
