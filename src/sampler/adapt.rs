//! Warm-up adaptation for the gradient-based step.
//!
//! - `DualAveraging`: drives the leapfrog step size toward a target mean
//!   acceptance statistic (Nesterov dual averaging, Hoffman & Gelman 2014).
//! - `RunningVariance`: Welford accumulator used to estimate a diagonal mass
//!   matrix from the draws of one warm-up window.

use crate::models::Position;

const GAMMA: f64 = 0.05;
const T0: f64 = 10.0;
const KAPPA: f64 = 0.75;

#[derive(Debug, Clone)]
pub struct DualAveraging {
    target: f64,
    mu: f64,
    h_bar: f64,
    log_step: f64,
    log_step_bar: f64,
    iteration: usize,
}

impl DualAveraging {
    pub fn new(step_size: f64, target: f64) -> Self {
        Self {
            target,
            mu: (10.0 * step_size).ln(),
            h_bar: 0.0,
            log_step: step_size.ln(),
            log_step_bar: 0.0,
            iteration: 0,
        }
    }

    /// Restart around a new initial step size (after a metric update).
    pub fn restart(&mut self, step_size: f64) {
        *self = Self::new(step_size, self.target);
    }

    /// Feed one acceptance statistic; returns the step size for the next iteration.
    pub fn update(&mut self, accept_stat: f64) -> f64 {
        let accept = if accept_stat.is_finite() { accept_stat.clamp(0.0, 1.0) } else { 0.0 };
        self.iteration += 1;
        let m = self.iteration as f64;
        let w = 1.0 / (m + T0);
        self.h_bar = (1.0 - w) * self.h_bar + w * (self.target - accept);
        self.log_step = self.mu - m.sqrt() / GAMMA * self.h_bar;
        let eta = m.powf(-KAPPA);
        self.log_step_bar = eta * self.log_step + (1.0 - eta) * self.log_step_bar;
        self.log_step.exp()
    }

    /// Averaged step size to use once warm-up is over.
    pub fn final_step_size(&self) -> Option<f64> {
        if self.iteration == 0 {
            return None;
        }
        Some(self.log_step_bar.exp())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunningVariance {
    n: usize,
    mean: Position,
    m2: Position,
}

impl RunningVariance {
    pub fn push(&mut self, x: &Position) {
        self.n += 1;
        let n = self.n as f64;
        for i in 0..3 {
            let delta = x[i] - self.mean[i];
            self.mean[i] += delta / n;
            self.m2[i] += delta * (x[i] - self.mean[i]);
        }
    }

    pub fn count(&self) -> usize {
        self.n
    }

    /// Sample variance shrunk toward a small constant, as Stan does for its
    /// diagonal metric. `None` before three draws.
    pub fn regularized(&self) -> Option<Position> {
        if self.n < 3 {
            return None;
        }
        let n = self.n as f64;
        let mut out = [0.0; 3];
        for i in 0..3 {
            let var = self.m2[i] / (n - 1.0);
            out[i] = (n / (n + 5.0)) * var + 1e-3 * (5.0 / (n + 5.0));
        }
        Some(out)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
