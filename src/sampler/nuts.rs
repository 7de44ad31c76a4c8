//! No-U-Turn sampler for the continuous block `(μ₁, μ₂, ln σ)`.
//!
//! Implementation of the slice-sampling variant of NUTS (Hoffman & Gelman
//! 2014, Algorithm 6) with a diagonal mass matrix:
//!
//! - the trajectory doubles in a random direction until it makes a U-turn,
//!   hits `max_tree_depth`, or the energy error exceeds `MAX_ENERGY_ERROR`
//!   (a divergence)
//! - the step size is adapted by dual averaging during warm-up
//! - the inverse metric is re-estimated once, from the draws of a middle
//!   warm-up window, after which the step size search restarts
//!
//! τ is held fixed for the duration of one transition.

use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

use crate::domain::SamplerConfig;
use crate::models::{ChangePointModel, Position};
use crate::sampler::adapt::{DualAveraging, RunningVariance};
use crate::sampler::step::{ChainState, SamplingStep, StepStats};

const MAX_ENERGY_ERROR: f64 = 1000.0;

/// Phase-space point with the gradient cached.
#[derive(Debug, Clone, Copy)]
struct Leaf {
    q: Position,
    p: Position,
    grad: Position,
}

#[derive(Debug, Clone)]
struct Tree {
    minus: Leaf,
    plus: Leaf,
    proposal: Position,
    n_valid: usize,
    keep_going: bool,
    alpha_sum: f64,
    n_alpha: usize,
    divergent: bool,
}

/// Result of a single NUTS transition.
#[derive(Debug, Clone, Copy)]
struct Transition {
    q: Position,
    accept_stat: f64,
    divergent: bool,
    depth: usize,
}

/// Warm-up window `[start, end)` used to estimate the mass matrix.
#[derive(Debug, Clone, Copy)]
struct MetricWindow {
    start: usize,
    end: usize,
}

impl MetricWindow {
    fn for_tune(tune: usize) -> Option<Self> {
        if tune < 20 {
            return None;
        }
        let start = tune * 15 / 100;
        let end = tune - tune / 10;
        (end > start + 2).then_some(Self { start, end })
    }
}

pub struct Nuts {
    inv_metric: Position,
    step_size: f64,
    max_depth: usize,
    dual: DualAveraging,
    window: Option<MetricWindow>,
    variance: RunningVariance,
    tune_iteration: usize,
    initialized: bool,
}

impl Nuts {
    pub fn new(model: &ChangePointModel, config: &SamplerConfig) -> Self {
        Self {
            inv_metric: model.inv_metric_hint(),
            step_size: 1.0,
            max_depth: config.max_tree_depth.max(1),
            dual: DualAveraging::new(1.0, config.target_accept),
            window: MetricWindow::for_tune(config.tune),
            variance: RunningVariance::default(),
            tune_iteration: 0,
            initialized: false,
        }
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    fn kinetic(&self, p: &Position) -> f64 {
        0.5 * (0..3).map(|i| self.inv_metric[i] * p[i] * p[i]).sum::<f64>()
    }

    fn sample_momentum(&self, rng: &mut StdRng) -> Position {
        let mut p = [0.0; 3];
        for i in 0..3 {
            let z: f64 = rng.sample(StandardNormal);
            p[i] = z / self.inv_metric[i].sqrt();
        }
        p
    }

    fn leapfrog(&self, model: &ChangePointModel, tau: usize, leaf: &Leaf, eps: f64) -> (Leaf, f64) {
        let mut p = leaf.p;
        let mut q = leaf.q;
        for i in 0..3 {
            p[i] += 0.5 * eps * leaf.grad[i];
        }
        for i in 0..3 {
            q[i] += eps * self.inv_metric[i] * p[i];
        }
        let mut grad = [0.0; 3];
        let logp = model.log_density_and_grad(tau, &q, &mut grad);
        for i in 0..3 {
            p[i] += 0.5 * eps * grad[i];
        }
        (Leaf { q, p, grad }, logp)
    }

    fn no_u_turn(&self, minus: &Leaf, plus: &Leaf) -> bool {
        let mut along_minus = 0.0;
        let mut along_plus = 0.0;
        for i in 0..3 {
            let dq = plus.q[i] - minus.q[i];
            along_minus += dq * self.inv_metric[i] * minus.p[i];
            along_plus += dq * self.inv_metric[i] * plus.p[i];
        }
        along_minus >= 0.0 && along_plus >= 0.0
    }

    #[allow(clippy::too_many_arguments)]
    fn build_tree(
        &self,
        model: &ChangePointModel,
        tau: usize,
        leaf: &Leaf,
        log_u: f64,
        direction: f64,
        depth: usize,
        joint0: f64,
        rng: &mut StdRng,
    ) -> Tree {
        if depth == 0 {
            let (next, logp) = self.leapfrog(model, tau, leaf, direction * self.step_size);
            let joint = logp - self.kinetic(&next.p);
            let keep_going = joint.is_finite() && log_u < MAX_ENERGY_ERROR + joint;
            let alpha = if joint.is_finite() {
                (joint - joint0).exp().min(1.0)
            } else {
                0.0
            };
            return Tree {
                minus: next,
                plus: next,
                proposal: next.q,
                n_valid: usize::from(joint.is_finite() && log_u <= joint),
                keep_going,
                alpha_sum: alpha,
                n_alpha: 1,
                divergent: !keep_going,
            };
        }

        let mut tree = self.build_tree(model, tau, leaf, log_u, direction, depth - 1, joint0, rng);
        if !tree.keep_going {
            return tree;
        }

        let edge = if direction < 0.0 { tree.minus } else { tree.plus };
        let other = self.build_tree(model, tau, &edge, log_u, direction, depth - 1, joint0, rng);
        if direction < 0.0 {
            tree.minus = other.minus;
        } else {
            tree.plus = other.plus;
        }

        let total = tree.n_valid + other.n_valid;
        if total > 0 && rng.r#gen::<f64>() < other.n_valid as f64 / total as f64 {
            tree.proposal = other.proposal;
        }
        tree.alpha_sum += other.alpha_sum;
        tree.n_alpha += other.n_alpha;
        tree.divergent |= other.divergent;
        tree.keep_going = other.keep_going && self.no_u_turn(&tree.minus, &tree.plus);
        tree.n_valid = total;
        tree
    }

    fn transition(&self, model: &ChangePointModel, tau: usize, q0: &Position, rng: &mut StdRng) -> Transition {
        let mut grad0 = [0.0; 3];
        let logp0 = model.log_density_and_grad(tau, q0, &mut grad0);
        let p0 = self.sample_momentum(rng);
        let joint0 = logp0 - self.kinetic(&p0);
        let u: f64 = rng.r#gen();
        let log_u = joint0 + u.ln();

        let start = Leaf { q: *q0, p: p0, grad: grad0 };
        let mut minus = start;
        let mut plus = start;
        let mut proposal = *q0;
        let mut n_valid = 1usize;
        let mut alpha_sum = 0.0;
        let mut n_alpha = 0usize;
        let mut divergent = false;
        let mut depth = 0;

        while depth < self.max_depth {
            let direction = if rng.r#gen::<bool>() { 1.0 } else { -1.0 };
            let tree = if direction < 0.0 {
                let t = self.build_tree(model, tau, &minus, log_u, direction, depth, joint0, rng);
                minus = t.minus;
                t
            } else {
                let t = self.build_tree(model, tau, &plus, log_u, direction, depth, joint0, rng);
                plus = t.plus;
                t
            };

            alpha_sum += tree.alpha_sum;
            n_alpha += tree.n_alpha;
            divergent |= tree.divergent;
            depth += 1;

            if !tree.keep_going {
                break;
            }
            if rng.r#gen::<f64>() < tree.n_valid as f64 / n_valid as f64 {
                proposal = tree.proposal;
            }
            n_valid += tree.n_valid;

            if !self.no_u_turn(&minus, &plus) {
                break;
            }
        }

        let accept_stat = if n_alpha > 0 { alpha_sum / n_alpha as f64 } else { 0.0 };
        Transition {
            q: proposal,
            accept_stat,
            divergent,
            depth,
        }
    }

    /// Heuristic initial step size: double or halve until the one-step
    /// acceptance ratio crosses 1/2.
    fn find_reasonable_step_size(&self, model: &ChangePointModel, tau: usize, q: &Position, rng: &mut StdRng) -> f64 {
        let mut grad = [0.0; 3];
        let logp = model.log_density_and_grad(tau, q, &mut grad);
        let p = self.sample_momentum(rng);
        let start = Leaf { q: *q, p, grad };
        let joint0 = logp - self.kinetic(&p);

        let log_ratio_at = |nuts: &Self, eps: f64| -> f64 {
            let (next, logp1) = nuts.leapfrog(model, tau, &start, eps);
            let r = logp1 - nuts.kinetic(&next.p) - joint0;
            if r.is_nan() { f64::NEG_INFINITY } else { r }
        };

        let mut eps = 1.0;
        let mut log_ratio = log_ratio_at(self, eps);
        let a: f64 = if log_ratio > 0.5f64.ln() { 1.0 } else { -1.0 };
        for _ in 0..100 {
            if a * log_ratio <= -a * 2f64.ln() {
                break;
            }
            let next = eps * 2f64.powf(a);
            if !(next.is_finite() && next > 1e-12 && next < 1e6) {
                break;
            }
            eps = next;
            log_ratio = log_ratio_at(self, eps);
        }
        eps
    }
}

impl SamplingStep for Nuts {
    fn name(&self) -> &'static str {
        "nuts"
    }

    fn step(
        &mut self,
        model: &ChangePointModel,
        state: &mut ChainState,
        rng: &mut StdRng,
        tuning: bool,
    ) -> StepStats {
        let tau = model.tau_at(state.tau_index);

        if !self.initialized {
            self.step_size = self.find_reasonable_step_size(model, tau, &state.q, rng);
            self.dual.restart(self.step_size);
            self.initialized = true;
        }

        let t = self.transition(model, tau, &state.q, rng);
        state.q = t.q;
        let used_step = self.step_size;

        if tuning {
            self.step_size = self.dual.update(t.accept_stat);

            if let Some(window) = self.window {
                let i = self.tune_iteration;
                if i >= window.start && i < window.end {
                    self.variance.push(&state.q);
                }
                if i + 1 == window.end {
                    if let Some(var) = self.variance.regularized() {
                        self.inv_metric = var;
                    }
                    self.variance.reset();
                    self.step_size = self.find_reasonable_step_size(model, tau, &state.q, rng);
                    self.dual.restart(self.step_size);
                }
            }
            self.tune_iteration += 1;
        }

        StepStats::Continuous {
            accept_stat: t.accept_stat,
            divergent: t.divergent,
            tree_depth: t.depth,
            step_size: used_step,
        }
    }

    fn end_tuning(&mut self) {
        if let Some(step) = self.dual.final_step_size() {
            self.step_size = step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SeriesKind, TauPrior};
    use crate::math::{mean, population_std};
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn noisy_shift(n: usize, at: usize, mu_1: f64, mu_2: f64, sigma: f64, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, sigma).unwrap();
        (0..n)
            .map(|t| (if t < at { mu_1 } else { mu_2 }) + noise.sample(&mut rng))
            .collect()
    }

    #[test]
    fn leapfrog_roughly_conserves_energy_for_small_steps() {
        let values = noisy_shift(80, 40, 0.0, 0.5, 0.1, 1);
        let model = ChangePointModel::build(&values, SeriesKind::LogReturns, TauPrior::Full).unwrap();
        let nuts = Nuts::new(&model, &SamplerConfig::default());
        let mut rng = StdRng::seed_from_u64(2);

        let q = [0.0, 0.5, (0.1f64).ln()];
        let mut grad = [0.0; 3];
        let logp = model.log_density_and_grad(40, &q, &mut grad);
        let leaf = Leaf { q, p: nuts.sample_momentum(&mut rng), grad };
        let h0 = logp - nuts.kinetic(&leaf.p);
        let (next, logp1) = nuts.leapfrog(&model, 40, &leaf, 0.01);
        let h1 = logp1 - nuts.kinetic(&next.p);
        assert!((h1 - h0).abs() < 1e-3, "energy drift {}", h1 - h0);
    }

    #[test]
    fn recovers_segment_means_with_fixed_tau() {
        let values = noisy_shift(200, 100, -0.2, 0.3, 0.1, 7);
        let model = ChangePointModel::build(&values, SeriesKind::LogReturns, TauPrior::Full).unwrap();
        let config = SamplerConfig {
            tune: 300,
            ..SamplerConfig::default()
        };
        let mut nuts = Nuts::new(&model, &config);
        let mut rng = StdRng::seed_from_u64(11);
        let mut state = ChainState {
            tau_index: 100,
            q: [0.0, 0.0, population_std(&values).unwrap().ln()],
        };

        for _ in 0..300 {
            nuts.step(&model, &mut state, &mut rng, true);
        }
        nuts.end_tuning();
        assert!(nuts.step_size() > 0.0);

        let mut mu_1 = Vec::new();
        let mut mu_2 = Vec::new();
        let mut sigma = Vec::new();
        let mut divergences = 0;
        for _ in 0..400 {
            if let StepStats::Continuous { divergent, .. } = nuts.step(&model, &mut state, &mut rng, false) {
                divergences += usize::from(divergent);
            }
            mu_1.push(state.q[0]);
            mu_2.push(state.q[1]);
            sigma.push(state.q[2].exp());
        }

        let m1 = mean(&values[..100]).unwrap();
        let m2 = mean(&values[100..]).unwrap();
        assert!((mean(&mu_1).unwrap() - m1).abs() < 0.02);
        assert!((mean(&mu_2).unwrap() - m2).abs() < 0.02);
        assert!((mean(&sigma).unwrap() - 0.1).abs() < 0.02);
        assert!(divergences < 20);
    }
}
