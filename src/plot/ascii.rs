//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Series plot elements:
//! - observations: `.`
//! - regime means: `-` (before the switch) and `=` (after)
//! - change point column: `|`
//!
//! The τ histogram is a horizontal bar chart of the posterior draws.

use crate::domain::{ModelSeries, PosteriorSamples};

/// Plot the modelled series with the regime means and the switch column.
pub fn render_series_plot(
    series: &ModelSeries,
    change_index: usize,
    mu_1: f64,
    mu_2: f64,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);
    let n = series.len();
    if n < 2 {
        return "Plot: (not enough observations)\n".to_string();
    }

    let (y_min, y_max) = y_range(&series.values, &[mu_1, mu_2]).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);
    let x_max = (n - 1) as f64;

    let mut grid = vec![vec![' '; width]; height];

    let cx = map_x(change_index as f64, 0.0, x_max, width);
    for row in grid.iter_mut() {
        row[cx] = '|';
    }

    for (i, &v) in series.values.iter().enumerate() {
        let x = map_x(i as f64, 0.0, x_max, width);
        let y = map_y(v, y_min, y_max, height);
        if grid[y][x] == ' ' {
            grid[y][x] = '.';
        }
    }

    // Means drawn last so they stay visible through dense data.
    let y1 = map_y(mu_1, y_min, y_max, height);
    let y2 = map_y(mu_2, y_min, y_max, height);
    draw_hline(&mut grid, y1, 0, cx, '-');
    draw_hline(&mut grid, y2, cx + 1, width, '=');

    let mut out = String::new();
    let first = series.dates.first().map(|d| d.to_string()).unwrap_or_default();
    let last = series.dates.last().map(|d| d.to_string()).unwrap_or_default();
    let change = series
        .dates
        .get(change_index)
        .map(|d| d.to_string())
        .unwrap_or_default();
    out.push_str(&format!(
        "Plot: {first} .. {last} | y=[{y_min:.4}, {y_max:.4}] | change at {change}\n"
    ));
    for row in grid {
        out.push_str(row.into_iter().collect::<String>().trim_end());
        out.push('\n');
    }
    out
}

/// Horizontal histogram of the τ draws, `bins` rows wide at most `width` characters.
pub fn render_tau_histogram(samples: &PosteriorSamples, series: &ModelSeries, bins: usize, width: usize) -> String {
    let taus: Vec<usize> = samples.draws().map(|d| d.tau).collect();
    let (Some(&lo), Some(&hi)) = (taus.iter().min(), taus.iter().max()) else {
        return "tau posterior: (no draws)\n".to_string();
    };

    let bins = bins.max(1).min(hi - lo + 1);
    let span = hi - lo + 1;
    let bin_of = |t: usize| ((t - lo) * bins / span).min(bins - 1);

    let mut counts = vec![0usize; bins];
    for &t in &taus {
        counts[bin_of(t)] += 1;
    }
    let max_count = counts.iter().copied().max().unwrap_or(1).max(1);
    let bar_width = width.max(10);

    let mut out = String::from("tau posterior:\n");
    for (b, &count) in counts.iter().enumerate() {
        let start = lo + b * span / bins;
        let label = series
            .dates
            .get(start.min(series.len().saturating_sub(1)))
            .map(|d| d.to_string())
            .unwrap_or_else(|| start.to_string());
        let len = (count * bar_width).div_ceil(max_count);
        let bar = if count > 0 { "#".repeat(len.max(1)) } else { String::new() };
        out.push_str(format!("{start:>6} {label} {count:>6} {bar}").trim_end());
        out.push('\n');
    }
    out
}

fn y_range(values: &[f64], extra: &[f64]) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &v in values.iter().chain(extra) {
        if v.is_finite() {
            min_y = min_y.min(v);
            max_y = max_y.max(v);
        }
    }
    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_hline(grid: &mut [Vec<char>], y: usize, x0: usize, x1: usize, ch: char) {
    let Some(row) = grid.get_mut(y) else { return };
    let end = x1.min(row.len());
    for cell in row.iter_mut().take(end).skip(x0) {
        if *cell != '|' {
            *cell = ch;
        }
    }
}
