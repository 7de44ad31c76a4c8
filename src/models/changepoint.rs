//! Single change-point model.
//!
//! ```text
//! τ        ~ Categorical(uniform over the candidate grid)
//! μ₁, μ₂   ~ Normal(center, s)
//! σ        ~ HalfNormal(s)
//! x[t]     ~ Normal(μ_sel(t), σ),   μ_sel(t) = μ₁ if t < τ else μ₂
//! ```
//!
//! `s` is the population standard deviation of the observations; `center` is
//! 0 for log-returns and the sample mean for prices.
//!
//! The continuous block is exposed on the unconstrained space `(μ₁, μ₂, ln σ)`
//! so a gradient-based sampler can move freely; the log-Jacobian of the
//! `σ = exp(ln σ)` transform is included in the density.
//!
//! Segment statistics come from prefix sums over mean-centered data, so one
//! density evaluation costs O(1) regardless of the series length.

use crate::domain::{SeriesKind, TauPrior};
use crate::error::AppError;
use crate::math::{LN_INV_SQRT_2PI, PrefixSums, half_normal_logpdf, mean, normal_logpdf, population_std};

/// Continuous position `(μ₁, μ₂, ln σ)`.
pub type Position = [f64; 3];

/// Starting point of a chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialValues {
    /// Index into the τ candidate grid (not time-step units).
    pub tau_index: usize,
    pub mu_1: f64,
    pub mu_2: f64,
    pub sigma: f64,
}

impl InitialValues {
    pub fn position(&self) -> Position {
        [self.mu_1, self.mu_2, self.sigma.ln()]
    }
}

/// Regime mean active at time step `t` for switch index `tau`.
///
/// Regime 1 covers `t < tau`; the boundary sample `t == tau` is regime 2.
pub fn select_mean(t: usize, tau: usize, mu_1: f64, mu_2: f64) -> f64 {
    if t < tau { mu_1 } else { mu_2 }
}

#[derive(Debug, Clone)]
pub struct ChangePointModel {
    kind: SeriesKind,
    n: usize,
    offset: f64,
    sums: PrefixSums,
    tau_grid: Vec<usize>,
    mu_center: f64,
    scale: f64,
}

impl ChangePointModel {
    /// Build the model over `values` (ordered in time).
    pub fn build(values: &[f64], kind: SeriesKind, tau_prior: TauPrior) -> Result<Self, AppError> {
        let n = values.len();
        if n < 2 {
            return Err(AppError::InsufficientData(format!(
                "Change-point model needs at least 2 observations, got {n}."
            )));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(AppError::InvalidInput(format!(
                "Non-finite observation at index {pos}."
            )));
        }

        let offset = mean(values).unwrap_or(0.0);
        let scale = population_std(values).unwrap_or(0.0);
        if !(scale.is_finite() && scale > 0.0) {
            return Err(AppError::InsufficientData(
                "Observations have zero variance; nothing to switch between.".to_string(),
            ));
        }

        let tau_grid = build_tau_grid(n, tau_prior)?;
        let mu_center = match kind {
            SeriesKind::LogReturns => 0.0,
            SeriesKind::Price => offset,
        };

        let centered: Vec<f64> = values.iter().map(|v| v - offset).collect();

        Ok(Self {
            kind,
            n,
            offset,
            sums: PrefixSums::new(&centered),
            tau_grid,
            mu_center,
            scale,
        })
    }

    pub fn kind(&self) -> SeriesKind {
        self.kind
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Candidate switch positions in time-step units.
    pub fn tau_grid(&self) -> &[usize] {
        &self.tau_grid
    }

    /// τ (time steps) for a candidate index. Indices past the grid clamp to the last candidate.
    pub fn tau_at(&self, index: usize) -> usize {
        self.tau_grid[index.min(self.tau_grid.len() - 1)]
    }

    /// Prior scale `s` (population std of the data).
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn mu_center(&self) -> f64 {
        self.mu_center
    }

    /// Log prior mass of any single τ candidate.
    pub fn tau_log_prior(&self) -> f64 {
        -(self.tau_grid.len() as f64).ln()
    }

    /// Data-driven starting point: middle τ candidate, half-sample means, data std.
    pub fn default_initial_values(&self) -> InitialValues {
        let half = self.n / 2;
        let first = self.sums.segment(0, half);
        let second = self.sums.segment(half, self.n);
        InitialValues {
            tau_index: self.tau_grid.len() / 2,
            mu_1: first.sum / first.count.max(1.0) + self.offset,
            mu_2: second.sum / second.count.max(1.0) + self.offset,
            sigma: self.scale,
        }
    }

    /// Rough posterior variances of `(μ₁, μ₂, ln σ)`; seeds the sampler's mass matrix.
    pub fn inv_metric_hint(&self) -> Position {
        let half = (self.n as f64 / 2.0).max(1.0);
        let mu_var = self.scale * self.scale / half;
        [mu_var, mu_var, 1.0 / (2.0 * self.n as f64)]
    }

    /// Log posterior density (up to a constant) at τ = `tau` and continuous position `q`.
    pub fn log_density(&self, tau: usize, q: &Position) -> f64 {
        let mut grad = [0.0; 3];
        self.log_density_and_grad(tau, q, &mut grad)
    }

    /// Log posterior density and its gradient with respect to `q`.
    pub fn log_density_and_grad(&self, tau: usize, q: &Position, grad: &mut Position) -> f64 {
        let [mu_1, mu_2, log_sigma] = *q;
        if !(mu_1.is_finite() && mu_2.is_finite() && log_sigma.is_finite()) {
            *grad = [0.0; 3];
            return f64::NEG_INFINITY;
        }
        let sigma = log_sigma.exp();
        let var = sigma * sigma;
        if !(var.is_finite() && var > 0.0) {
            *grad = [0.0; 3];
            return f64::NEG_INFINITY;
        }

        let tau = tau.min(self.n);
        let before = self.sums.segment(0, tau);
        let after = self.sums.segment(tau, self.n);
        let c1 = mu_1 - self.offset;
        let c2 = mu_2 - self.offset;
        let sse = before.sse(c1) + after.sse(c2);
        let n = self.n as f64;

        let log_lik = n * LN_INV_SQRT_2PI - n * log_sigma - sse / (2.0 * var);
        let log_prior = normal_logpdf(mu_1, self.mu_center, self.scale)
            + normal_logpdf(mu_2, self.mu_center, self.scale)
            + half_normal_logpdf(sigma, self.scale)
            + log_sigma;

        let s2 = self.scale * self.scale;
        grad[0] = (before.sum - before.count * c1) / var - (mu_1 - self.mu_center) / s2;
        grad[1] = (after.sum - after.count * c2) / var - (mu_2 - self.mu_center) / s2;
        grad[2] = -n + sse / var - var / s2 + 1.0;

        log_lik + log_prior
    }
}

fn build_tau_grid(n: usize, tau_prior: TauPrior) -> Result<Vec<usize>, AppError> {
    match tau_prior {
        TauPrior::Full => Ok((0..n).collect()),
        TauPrior::Blocked { block } => {
            if block == 0 {
                return Err(AppError::InvalidInput("τ block size must be >= 1.".to_string()));
            }
            let candidates = n / block;
            if candidates == 0 {
                return Err(AppError::InsufficientData(format!(
                    "Series of length {n} is shorter than one τ block ({block})."
                )));
            }
            Ok((0..candidates).map(|i| i * block).collect())
        }
    }
}
