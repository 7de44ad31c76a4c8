//! Formatted terminal output for an analysis run.
//!
//! We keep formatting code in one place so:
//! - the sampling/interpretation code stays clean and testable
//! - output changes are localized

use crate::analysis::PosteriorSummary;
use crate::app::pipeline::RunOutput;
use crate::domain::{AnalyzeConfig, ChangePointResult, Frequency, Impact, Param, SeriesKind, TauPrior};
use crate::sampler::Diagnostics;

/// Data, model and sampler setup of a run.
pub fn format_run_summary(run: &RunOutput, config: &AnalyzeConfig) -> String {
    let mut out = String::new();
    let stats = &run.stats;

    out.push_str("=== bcp - Brent change-point analysis ===\n");
    out.push_str(&format!("Prices: {}\n", config.prices_path.display()));
    out.push_str(&format!(
        "Rows: read={} kept={} filled={} dropped_leading={} duplicates={}\n",
        run.load.rows_read,
        run.prices.len(),
        run.load.filled,
        run.load.dropped_leading,
        run.load.duplicates,
    ));
    out.push_str(&format!(
        "Series: {} ({}) n={} | {} .. {}\n",
        series_label(run.model_series.kind),
        frequency_label(run.model_series.frequency),
        stats.n,
        stats.first_date,
        stats.last_date,
    ));
    out.push_str(&format!(
        "  mean={:.6} std={:.6} min={:.6} max={:.6}\n",
        stats.mean, stats.std, stats.min, stats.max
    ));

    let tau_desc = match config.tau_prior {
        TauPrior::Full => "full resolution".to_string(),
        TauPrior::Blocked { block } => format!("block={block}"),
    };
    out.push_str(&format!("Model: tau candidates={} ({tau_desc})\n", run.tau_candidates));

    let s = &config.sampler;
    out.push_str(&format!(
        "Sampler: chains={} tune={} draws={} target_accept={} seed={}\n",
        s.chains, s.tune, s.draws, s.target_accept, s.seed
    ));
    for c in &run.samples.chains {
        out.push_str(&format!(
            "  chain {}: step={:.4} accept={:.3} depth={:.2} tau_accept={:.3} divergences={}\n",
            c.chain,
            c.stats.step_size,
            c.stats.nuts_accept,
            c.stats.mean_tree_depth,
            c.stats.tau_accept,
            c.stats.divergences,
        ));
    }
    out.push('\n');
    out
}

/// Posterior table with convergence columns.
pub fn format_posterior_table(summary: &PosteriorSummary, diagnostics: &Diagnostics) -> String {
    let mut out = String::new();
    out.push_str("Posterior:\n");
    out.push_str(
        format!(
            "{:<8} {:>12} {:>12} {:>12} {:>12} {:>7} {:>8}",
            "param", "mean", "sd", "2.5%", "97.5%", "r_hat", "ess"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&format!(
        "{:-<8} {:-<12} {:-<12} {:-<12} {:-<12} {:-<7} {:-<8}\n",
        "", "", "", "", "", "", ""
    ));

    for p in &summary.params {
        let (rhat, ess) = diagnostics
            .get(p.param)
            .map(|d| (fmt_opt(d.rhat, 3), fmt_opt(d.ess, 0)))
            .unwrap_or_else(|| ("-".to_string(), "-".to_string()));
        let decimals = if p.param == Param::Tau { 1 } else { 6 };
        out.push_str(
            format!(
                "{:<8} {:>12.d$} {:>12.d$} {:>12.d$} {:>12.d$} {:>7} {:>8}",
                p.param.name(),
                p.mean,
                p.sd,
                p.q025,
                p.q975,
                rhat,
                ess,
                d = decimals,
            )
            .trim_end(),
        );
        out.push('\n');
    }

    let warnings = diagnostics.warnings();
    if !warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for w in warnings {
            out.push_str(&format!("- {w}\n"));
        }
    }
    out
}

/// The interpreted change point.
pub fn format_change_point(result: &ChangePointResult) -> String {
    let mut out = String::new();
    out.push_str("\nChange point:\n");
    out.push_str(&format!("- date : {}\n", result.change_point_date));
    out.push_str(&format!(
        "- event: {} ({})\n",
        result.associated_event, result.event_date
    ));
    if !result.event_description.is_empty() {
        out.push_str(&format!("         {}\n", result.event_description));
    }
    match result.impact {
        Impact::LogReturn { log_return_change } => {
            out.push_str(&format!("- mean log-return change: {log_return_change:+.4}\n"));
        }
        Impact::Price {
            price_change_usd,
            percent_change,
        } => {
            out.push_str(&format!(
                "- mean price change: {price_change_usd:+.2} USD ({percent_change:+.2}%)\n"
            ));
        }
    }
    out
}

fn series_label(kind: SeriesKind) -> &'static str {
    match kind {
        SeriesKind::LogReturns => "log-returns",
        SeriesKind::Price => "price",
    }
}

fn frequency_label(frequency: Frequency) -> &'static str {
    match frequency {
        Frequency::Daily => "daily",
        Frequency::Weekly => "weekly",
    }
}

fn fmt_opt(v: f64, decimals: usize) -> String {
    if v.is_finite() {
        format!("{v:.decimals$}")
    } else {
        "-".to_string()
    }
}
