//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs logging
//! - runs the analysis pipeline and prints reports/plots
//! - writes the dashboard artifact and optional exports
//! - starts the API server

use clap::Parser;
use tracing::{info, warn};

use crate::cli::{AnalyzeArgs, CleanArgs, Command, ServeArgs, SynthArgs};
use crate::domain::{AnalyzeConfig, Param, SamplerConfig, ServeConfig, TauPrior};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `bcp` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // We want a bare `bcp` (or `bcp --prices x.csv`) to behave like `bcp analyze ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);
    crate::logging::init(cli.verbosity());

    match cli.command {
        Command::Analyze(args) => handle_analyze(&args),
        Command::Clean(args) => handle_clean(&args),
        Command::Serve(args) => handle_serve(args),
        Command::Synth(args) => handle_synth(&args),
    }
}

fn handle_analyze(args: &AnalyzeArgs) -> Result<(), AppError> {
    let config = analyze_config_from_args(args);
    let run = pipeline::run_analysis(&config)?;

    println!("{}", crate::report::format_run_summary(&run, &config));
    println!("{}", crate::report::format_posterior_table(&run.summary, &run.diagnostics));

    if config.plot {
        let mu_1 = run.samples.mean(Param::Mu1).unwrap_or(0.0);
        let mu_2 = run.samples.mean(Param::Mu2).unwrap_or(0.0);
        println!(
            "{}",
            crate::plot::render_series_plot(
                &run.model_series,
                run.change_index(),
                mu_1,
                mu_2,
                config.plot_width,
                config.plot_height,
            )
        );
        println!(
            "{}",
            crate::plot::render_tau_histogram(&run.samples, &run.model_series, 12, config.plot_width / 2)
        );
    }

    println!("{}", crate::report::format_change_point(&run.result));

    crate::io::write_dashboard_json(&config.output_path, &run.document())?;
    if let Some(path) = &config.trace_out {
        crate::io::write_trace_csv(path, &run.samples)?;
    }
    Ok(())
}

fn handle_clean(args: &CleanArgs) -> Result<(), AppError> {
    let (series, report) = crate::io::load_price_series(&args.raw)?;
    crate::io::write_cleaned_csv(&args.out, &series)?;
    println!(
        "Cleaned {} rows -> {} ({} kept, {} filled, {} leading dropped, {} duplicates)",
        report.rows_read,
        args.out.display(),
        series.len(),
        report.filled,
        report.dropped_leading,
        report.duplicates,
    );
    Ok(())
}

fn handle_serve(args: ServeArgs) -> Result<(), AppError> {
    let config = ServeConfig {
        data_path: args.data,
        addr: args.addr,
        cors_origin: args.cors_origin,
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::Server(format!("Failed to start async runtime: {e}")))?;
    runtime.block_on(crate::server::serve(config))
}

fn handle_synth(args: &SynthArgs) -> Result<(), AppError> {
    let config = crate::data::SynthConfig {
        start: args.start,
        days: args.days,
        shift_index: args.shift_index.unwrap_or(args.days / 2),
        start_price: args.start_price,
        drift_before: args.drift_before,
        drift_after: args.drift_after,
        volatility: args.volatility,
        seed: args.seed,
        event_name: args.event_name.clone(),
        event_description: args.event_description.clone(),
    };
    let data = crate::data::generate(&config)?;
    crate::data::write_synthetic(&data, &config, &args.out, &args.events_out)?;
    println!(
        "Wrote {} prices to {} (shift on {}) and events to {}",
        data.prices.len(),
        args.out.display(),
        data.shift_date,
        args.events_out.display(),
    );
    Ok(())
}

pub fn analyze_config_from_args(args: &AnalyzeArgs) -> AnalyzeConfig {
    let tau_prior = if args.full_tau {
        TauPrior::Full
    } else {
        TauPrior::Blocked { block: args.tau_block }
    };
    if args.tune < 20 && args.tune > 0 {
        warn!(tune = args.tune, "very short warm-up; mass matrix adaptation is skipped");
    }
    info!(
        prices = %args.prices.display(),
        events = %args.events.display(),
        output = %args.output.display(),
        "analyze configuration"
    );

    AnalyzeConfig {
        prices_path: args.prices.clone(),
        events_path: args.events.clone(),
        output_path: args.output.clone(),
        series_kind: args.series,
        frequency: args.frequency,
        tau_prior,
        sampler: SamplerConfig {
            draws: args.draws,
            tune: args.tune,
            chains: args.chains,
            target_accept: args.target_accept,
            seed: args.seed,
            max_tree_depth: args.max_tree_depth,
        },
        trace_out: args.trace_out.clone(),
        plot: args.plot && !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
    }
}

/// Rewrite argv so `bcp` defaults to `bcp analyze`.
///
/// Rules:
/// - `bcp`                         -> `bcp analyze`
/// - `bcp --prices x.csv ...`      -> `bcp analyze --prices x.csv ...`
/// - `bcp --help/--version/-h`     -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("analyze".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "analyze" | "clean" | "serve" | "synth");
    if is_subcommand {
        return argv;
    }

    // A leading flag means "analyze flags". Global flags still parse after the subcommand.
    if arg1.starts_with('-') {
        argv.insert(1, "analyze".to_string());
        return argv;
    }

    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_means_analyze() {
        assert_eq!(rewrite_args(args(&["bcp"])), args(&["bcp", "analyze"]));
        assert_eq!(
            rewrite_args(args(&["bcp", "--full-tau"])),
            args(&["bcp", "analyze", "--full-tau"])
        );
        assert_eq!(rewrite_args(args(&["bcp", "serve"])), args(&["bcp", "serve"]));
        assert_eq!(rewrite_args(args(&["bcp", "--help"])), args(&["bcp", "--help"]));
    }

    #[test]
    fn config_from_args_resolves_prior_and_plot() {
        let cli = Cli::parse_from(rewrite_args(args(&["bcp", "--tau-block", "5", "--no-plot", "--seed", "7"])));
        let Command::Analyze(a) = cli.command else { panic!("expected analyze") };
        let config = analyze_config_from_args(&a);
        assert_eq!(config.tau_prior, TauPrior::Blocked { block: 5 });
        assert!(!config.plot);
        assert_eq!(config.sampler.seed, 7);
        assert_eq!(config.sampler.target_accept, 0.95);

        let cli = Cli::parse_from(args(&["bcp", "analyze", "--full-tau"]));
        let Command::Analyze(a) = cli.command else { panic!("expected analyze") };
        assert_eq!(analyze_config_from_args(&a).tau_prior, TauPrior::Full);
    }
}
