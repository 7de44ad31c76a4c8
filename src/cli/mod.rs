//! Command-line parsing for the Brent change-point tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/sampling code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::{Frequency, SeriesKind};

pub const DEFAULT_PRICES: &str = "data/processed/cleaned_oil_data.csv";
pub const DEFAULT_EVENTS: &str = "data/events/major_events.csv";
pub const DEFAULT_OUTPUT: &str = "dashboard/backend/data.json";

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "bcp", version, about = "Bayesian change-point analysis of Brent crude prices")]
pub struct Cli {
    /// More log output (repeatable).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Less log output (repeatable).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn verbosity(&self) -> i8 {
        self.verbose.min(8) as i8 - self.quiet.min(8) as i8
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the change-point model, print the summary, and write the dashboard JSON.
    Analyze(AnalyzeArgs),
    /// Clean a raw price CSV (sort, de-duplicate, forward-fill, log-returns).
    Clean(CleanArgs),
    /// Serve the dashboard JSON over HTTP.
    Serve(ServeArgs),
    /// Write a synthetic price file and event table with a known shift.
    Synth(SynthArgs),
}

/// Options for `bcp analyze`.
#[derive(Debug, Args, Clone)]
pub struct AnalyzeArgs {
    /// Price CSV (`Date,Price`, cleaned or raw).
    #[arg(long, default_value = DEFAULT_PRICES)]
    pub prices: PathBuf,

    /// Event CSV (`Start Date,Event Name,Description`).
    #[arg(long, default_value = DEFAULT_EVENTS)]
    pub events: PathBuf,

    /// Dashboard JSON to write.
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Quantity to model.
    #[arg(long, value_enum, default_value_t = SeriesKind::LogReturns)]
    pub series: SeriesKind,

    /// Modelling frequency.
    #[arg(long, value_enum, default_value_t = Frequency::Weekly)]
    pub frequency: Frequency,

    /// τ candidates are spaced this many observations apart.
    #[arg(long, default_value_t = 20, conflicts_with = "full_tau")]
    pub tau_block: usize,

    /// Allow τ at every observation (overrides --tau-block).
    #[arg(long)]
    pub full_tau: bool,

    /// Retained draws per chain.
    #[arg(long, default_value_t = 250)]
    pub draws: usize,

    /// Warm-up iterations per chain (discarded).
    #[arg(long, default_value_t = 5000)]
    pub tune: usize,

    /// Number of chains (run in parallel).
    #[arg(long, default_value_t = 4)]
    pub chains: usize,

    /// Target mean acceptance statistic for NUTS step-size adaptation.
    #[arg(long, default_value_t = 0.95)]
    pub target_accept: f64,

    /// Maximum NUTS tree depth.
    #[arg(long, default_value_t = 10)]
    pub max_tree_depth: usize,

    /// Base random seed; chain `c` uses `seed + c`.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Also write every posterior draw to this CSV.
    #[arg(long)]
    pub trace_out: Option<PathBuf>,

    /// Render ASCII plots in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plots.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

/// Options for `bcp clean`.
#[derive(Debug, Args, Clone)]
pub struct CleanArgs {
    /// Raw price CSV.
    #[arg(long, value_name = "CSV")]
    pub raw: PathBuf,

    /// Cleaned CSV to write.
    #[arg(long, value_name = "CSV", default_value = DEFAULT_PRICES)]
    pub out: PathBuf,
}

/// Options for `bcp serve`.
#[derive(Debug, Args, Clone)]
pub struct ServeArgs {
    /// Dashboard JSON produced by `bcp analyze`.
    #[arg(long, env = "BCP_DATA", default_value = DEFAULT_OUTPUT)]
    pub data: PathBuf,

    /// Listen address.
    #[arg(long, env = "BCP_ADDR", default_value = "127.0.0.1:5000")]
    pub addr: String,

    /// The single origin allowed by CORS.
    #[arg(long, env = "BCP_CORS_ORIGIN", default_value = "http://localhost:5173")]
    pub cors_origin: String,
}

/// Options for `bcp synth`.
#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Raw price CSV to write.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,

    /// One-row event CSV to write (dated at the shift).
    #[arg(long, value_name = "CSV")]
    pub events_out: PathBuf,

    /// First business day.
    #[arg(long, default_value = "2015-01-01")]
    pub start: NaiveDate,

    /// Number of business days.
    #[arg(long, default_value_t = 1500)]
    pub days: usize,

    /// Index of the first day of the second regime (default: middle).
    #[arg(long)]
    pub shift_index: Option<usize>,

    #[arg(long, default_value_t = 60.0)]
    pub start_price: f64,

    /// Mean daily log-return before the shift.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub drift_before: f64,

    /// Mean daily log-return after the shift.
    #[arg(long, default_value_t = -0.004, allow_negative_numbers = true)]
    pub drift_after: f64,

    /// Daily log-return volatility.
    #[arg(long, default_value_t = 0.02)]
    pub volatility: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value = "Synthetic supply shock")]
    pub event_name: String,

    #[arg(long, default_value = "Injected drift change")]
    pub event_description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn analyze_defaults() {
        let cli = Cli::parse_from(["bcp", "analyze"]);
        let Command::Analyze(args) = cli.command else { panic!("expected analyze") };
        assert_eq!(args.prices, PathBuf::from(DEFAULT_PRICES));
        assert_eq!(args.output, PathBuf::from(DEFAULT_OUTPUT));
        assert_eq!(args.frequency, Frequency::Weekly);
        assert_eq!(args.series, SeriesKind::LogReturns);
        assert_eq!((args.draws, args.tune, args.chains), (250, 5000, 4));
        assert_eq!(args.tau_block, 20);
        assert!(!args.full_tau);
    }

    #[test]
    fn global_verbosity_flags() {
        let cli = Cli::parse_from(["bcp", "-vv", "analyze", "-q", "--series", "price", "--full-tau"]);
        assert_eq!(cli.verbosity(), 1);
        let Command::Analyze(args) = cli.command else { panic!("expected analyze") };
        assert_eq!(args.series, SeriesKind::Price);
        assert!(args.full_tau);
    }

    #[test]
    fn synth_accepts_negative_drift() {
        let cli = Cli::parse_from(["bcp", "synth", "--out", "a.csv", "--events-out", "b.csv", "--drift-after", "-0.01"]);
        let Command::Synth(args) = cli.command else { panic!("expected synth") };
        assert_eq!(args.drift_after, -0.01);
        assert_eq!(args.start, NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());
    }
}
