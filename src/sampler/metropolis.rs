//! Metropolis update for the discrete switch index.
//!
//! Gradient-based samplers cannot move a categorical parameter, so τ gets its
//! own random-walk Metropolis step on the candidate-grid index:
//!
//! - with probability `jump_prob` the proposal is uniform over the whole grid
//! - otherwise it is `current + round(N(0, scale))`, never a zero move
//!
//! Both kernels are symmetric, so acceptance is the plain density ratio.
//! Proposals outside the grid have zero prior mass and are rejected.

use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

use crate::models::ChangePointModel;
use crate::sampler::step::{ChainState, SamplingStep, StepStats};

const DEFAULT_JUMP_PROB: f64 = 0.1;
const TUNE_INTERVAL: usize = 100;

pub struct TauMetropolis {
    scale: f64,
    jump_prob: f64,
    grid_len: usize,
    window_steps: usize,
    window_accepted: usize,
}

impl TauMetropolis {
    pub fn new(model: &ChangePointModel) -> Self {
        let grid_len = model.tau_grid().len();
        Self {
            scale: initial_scale(grid_len),
            jump_prob: DEFAULT_JUMP_PROB,
            grid_len,
            window_steps: 0,
            window_accepted: 0,
        }
    }

    fn propose(&self, current: usize, rng: &mut StdRng) -> Option<usize> {
        if rng.r#gen::<f64>() < self.jump_prob {
            return Some(rng.gen_range(0..self.grid_len));
        }

        let z: f64 = rng.sample(StandardNormal);
        let mut delta = (z * self.scale).round() as i64;
        if delta == 0 {
            delta = if rng.r#gen::<bool>() { 1 } else { -1 };
        }
        let proposal = current as i64 + delta;
        if proposal < 0 || proposal >= self.grid_len as i64 {
            return None;
        }
        Some(proposal as usize)
    }

    fn record(&mut self, accepted: bool) {
        self.window_steps += 1;
        if accepted {
            self.window_accepted += 1;
        }
        if self.window_steps >= TUNE_INTERVAL {
            let rate = self.window_accepted as f64 / self.window_steps as f64;
            self.scale = tune_scale(self.scale, rate).clamp(0.5, self.grid_len.max(1) as f64);
            self.window_steps = 0;
            self.window_accepted = 0;
        }
    }
}

impl SamplingStep for TauMetropolis {
    fn name(&self) -> &'static str {
        "metropolis"
    }

    fn step(
        &mut self,
        model: &ChangePointModel,
        state: &mut ChainState,
        rng: &mut StdRng,
        tuning: bool,
    ) -> StepStats {
        if self.grid_len < 2 {
            return StepStats::Discrete { accepted: false };
        }

        let accepted = match self.propose(state.tau_index, rng) {
            Some(proposal) => {
                let current_lp = model.log_density(model.tau_at(state.tau_index), &state.q);
                let proposal_lp = model.log_density(model.tau_at(proposal), &state.q);
                let log_alpha = proposal_lp - current_lp;
                let u: f64 = rng.r#gen();
                let accept = if current_lp.is_finite() {
                    proposal_lp.is_finite() && (log_alpha >= 0.0 || u.ln() < log_alpha)
                } else {
                    proposal_lp.is_finite()
                };
                if accept {
                    state.tau_index = proposal;
                }
                accept
            }
            None => false,
        };

        if tuning {
            self.record(accepted);
        }
        StepStats::Discrete { accepted }
    }
}

fn initial_scale(grid_len: usize) -> f64 {
    (grid_len as f64 / 10.0).max(1.0)
}

/// Rescale the proposal width from the acceptance rate of the last window.
fn tune_scale(scale: f64, acceptance: f64) -> f64 {
    if acceptance < 0.001 {
        scale * 0.1
    } else if acceptance < 0.05 {
        scale * 0.5
    } else if acceptance < 0.2 {
        scale * 0.9
    } else if acceptance > 0.95 {
        scale * 10.0
    } else if acceptance > 0.75 {
        scale * 2.0
    } else if acceptance > 0.5 {
        scale * 1.1
    } else {
        scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SeriesKind, TauPrior};
    use rand::SeedableRng;

    #[test]
    fn tune_table_moves_scale_in_the_right_direction() {
        assert!(tune_scale(1.0, 0.0) < 0.2);
        assert!(tune_scale(1.0, 0.1) < 1.0);
        assert_eq!(tune_scale(1.0, 0.3), 1.0);
        assert!(tune_scale(1.0, 0.6) > 1.0);
        assert!(tune_scale(1.0, 0.99) >= 10.0);
    }

    #[test]
    fn proposals_stay_on_the_grid() {
        let values: Vec<f64> = (0..50).map(|i| (if i < 25 { 0.0 } else { 1.0 }) + (i % 3) as f64 * 0.01).collect();
        let model = ChangePointModel::build(&values, SeriesKind::LogReturns, TauPrior::Full).unwrap();
        let step = TauMetropolis::new(&model);
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..500 {
            if let Some(p) = step.propose(0, &mut rng) {
                assert!(p < 50);
            }
        }
    }

    #[test]
    fn climbs_to_the_true_switch() {
        let values: Vec<f64> = (0..60).map(|i| (if i < 40 { 0.0 } else { 1.0 }) + ((i * 7) % 5) as f64 * 0.01).collect();
        let model = ChangePointModel::build(&values, SeriesKind::LogReturns, TauPrior::Full).unwrap();
        let mut step = TauMetropolis::new(&model);
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = ChainState {
            tau_index: 5,
            q: [0.02, 1.02, (0.02f64).ln()],
        };
        for _ in 0..2000 {
            step.step(&model, &mut state, &mut rng, true);
        }
        assert_eq!(model.tau_at(state.tau_index), 40);
    }
}
