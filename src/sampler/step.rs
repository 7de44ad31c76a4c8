//! Sampling steps and their composition.
//!
//! A chain iteration is a `CompoundStep`: each member step updates its own
//! block of parameters in turn, conditioning on the current values of the
//! others. Here that means one discrete update of τ followed by one
//! gradient-based update of `(μ₁, μ₂, ln σ)`.

use rand::rngs::StdRng;

use crate::models::{ChangePointModel, Position};

/// Mutable state of one chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainState {
    /// Index into the model's τ candidate grid.
    pub tau_index: usize,
    /// Continuous position `(μ₁, μ₂, ln σ)`.
    pub q: Position,
}

/// What a single step reports back to the runner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepStats {
    Discrete {
        accepted: bool,
    },
    Continuous {
        accept_stat: f64,
        divergent: bool,
        tree_depth: usize,
        step_size: f64,
    },
}

/// One update rule for a subset of the parameters.
pub trait SamplingStep: Send {
    fn name(&self) -> &'static str;

    /// Update `state` in place. `tuning` is true during warm-up.
    fn step(
        &mut self,
        model: &ChangePointModel,
        state: &mut ChainState,
        rng: &mut StdRng,
        tuning: bool,
    ) -> StepStats;

    /// Called once, after the last warm-up iteration.
    fn end_tuning(&mut self) {}
}

/// Applies its member steps in order, once each per iteration.
pub struct CompoundStep {
    steps: Vec<Box<dyn SamplingStep>>,
}

impl CompoundStep {
    pub fn new(steps: Vec<Box<dyn SamplingStep>>) -> Self {
        Self { steps }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn step(
        &mut self,
        model: &ChangePointModel,
        state: &mut ChainState,
        rng: &mut StdRng,
        tuning: bool,
    ) -> Vec<StepStats> {
        self.steps
            .iter_mut()
            .map(|s| s.step(model, state, rng, tuning))
            .collect()
    }

    pub fn end_tuning(&mut self) {
        for s in &mut self.steps {
            s.end_tuning();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SeriesKind, TauPrior};
    use rand::SeedableRng;

    struct Nudge;

    impl SamplingStep for Nudge {
        fn name(&self) -> &'static str {
            "nudge"
        }

        fn step(&mut self, _: &ChangePointModel, state: &mut ChainState, _: &mut StdRng, _: bool) -> StepStats {
            state.q[0] += 1.0;
            StepStats::Discrete { accepted: true }
        }
    }

    #[test]
    fn compound_applies_every_member_in_order() {
        let model =
            ChangePointModel::build(&[0.0, 1.0, 0.5, 2.0], SeriesKind::LogReturns, TauPrior::Full).unwrap();
        let mut compound = CompoundStep::new(vec![Box::new(Nudge), Box::new(Nudge)]);
        let mut state = ChainState {
            tau_index: 0,
            q: [0.0, 0.0, 0.0],
        };
        let mut rng = StdRng::seed_from_u64(1);
        let stats = compound.step(&model, &mut state, &mut rng, false);
        assert_eq!(stats.len(), 2);
        assert_eq!(state.q[0], 2.0);
        assert_eq!(compound.names(), vec!["nudge", "nudge"]);
    }
}
