//! Convergence diagnostics: split R̂ and effective sample size.
//!
//! These are reported and logged; they never fail a run.

use tracing::warn;

use crate::domain::{Param, PosteriorSamples};
use crate::math::{mean, sample_variance};

/// R̂ above this is flagged.
pub const RHAT_WARN: f64 = 1.01;

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDiagnostics {
    pub param: Param,
    pub rhat: f64,
    pub ess: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub params: Vec<ParamDiagnostics>,
    pub divergences: usize,
}

impl Diagnostics {
    pub fn get(&self, param: Param) -> Option<&ParamDiagnostics> {
        self.params.iter().find(|p| p.param == param)
    }

    /// Human-readable warnings (empty when everything looks fine).
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.divergences > 0 {
            out.push(format!(
                "{} divergent transitions after warm-up; consider raising --target-accept.",
                self.divergences
            ));
        }
        for p in &self.params {
            if p.rhat.is_finite() && p.rhat > RHAT_WARN {
                out.push(format!(
                    "R-hat for {} is {:.3} (> {RHAT_WARN}); chains may not have mixed.",
                    p.param.name(),
                    p.rhat
                ));
            }
        }
        out
    }
}

/// Compute diagnostics for every parameter and log any warnings.
pub fn diagnose(samples: &PosteriorSamples) -> Diagnostics {
    let params = Param::ALL
        .iter()
        .map(|&param| {
            let columns = samples.chain_columns(param);
            ParamDiagnostics {
                param,
                rhat: split_rhat(&columns),
                ess: ess(&columns),
            }
        })
        .collect();

    let diagnostics = Diagnostics {
        params,
        divergences: samples.total_divergences(),
    };
    for w in diagnostics.warnings() {
        warn!("{w}");
    }
    diagnostics
}

fn split_chains(chains: &[Vec<f64>]) -> Vec<&[f64]> {
    let mut out = Vec::with_capacity(chains.len() * 2);
    for c in chains {
        let half = c.len() / 2;
        if half < 2 {
            continue;
        }
        out.push(&c[..half]);
        out.push(&c[c.len() - half..]);
    }
    out
}

/// Split R̂ (Gelman et al., BDA3). `NaN` when there are too few draws.
pub fn split_rhat(chains: &[Vec<f64>]) -> f64 {
    let halves = split_chains(chains);
    if halves.len() < 2 {
        return f64::NAN;
    }
    let n = halves[0].len() as f64;

    let means: Vec<f64> = halves.iter().filter_map(|h| mean(h)).collect();
    let w = halves
        .iter()
        .filter_map(|h| sample_variance(h))
        .sum::<f64>()
        / halves.len() as f64;
    let b = n * sample_variance(&means).unwrap_or(0.0);

    if w <= 0.0 {
        return if b <= 0.0 { 1.0 } else { f64::INFINITY };
    }
    let var_plus = (n - 1.0) / n * w + b / n;
    (var_plus / w).sqrt()
}

/// Multi-chain effective sample size with Geyer's initial positive sequence.
pub fn ess(chains: &[Vec<f64>]) -> f64 {
    let halves = split_chains(chains);
    let m = halves.len();
    if m < 2 {
        return f64::NAN;
    }
    let n = halves[0].len();
    let nf = n as f64;

    let means: Vec<f64> = halves.iter().filter_map(|h| mean(h)).collect();
    let variances: Vec<f64> = halves.iter().filter_map(|h| sample_variance(h)).collect();
    let w = variances.iter().sum::<f64>() / m as f64;
    let b_over_n = sample_variance(&means).unwrap_or(0.0);
    let var_plus = (nf - 1.0) / nf * w + b_over_n;
    if !(var_plus > 0.0) {
        return (m * n) as f64;
    }

    let autocov: Vec<Vec<f64>> = halves.iter().map(|h| autocovariance(h)).collect();
    let rho = |lag: usize| -> f64 {
        let mean_acov = autocov.iter().map(|a| a[lag]).sum::<f64>() / m as f64;
        1.0 - (w - mean_acov) / var_plus
    };

    let mut tau_sum = 0.0;
    let mut prev_pair = f64::INFINITY;
    let mut lag = 0;
    while lag + 1 < n {
        let mut pair = rho(lag) + rho(lag + 1);
        if pair <= 0.0 {
            break;
        }
        pair = pair.min(prev_pair);
        tau_sum += pair;
        prev_pair = pair;
        lag += 2;
    }

    let tau = (2.0 * tau_sum - 1.0).max(1.0 / ((m * n) as f64).log10().max(1.0));
    (m * n) as f64 / tau
}

/// Autocovariance at every lag, normalised like `sample_variance` at lag 0.
fn autocovariance(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    let m = mean(x).unwrap_or(0.0);
    let centered: Vec<f64> = x.iter().map(|v| v - m).collect();
    (0..n)
        .map(|lag| {
            let s: f64 = (0..n - lag).map(|i| centered[i] * centered[i + lag]).sum();
            s / (n as f64 - 1.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChainStats, ChainTrace, Draw};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    fn iid(seed: u64, n: usize, shift: f64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let d = Normal::new(shift, 1.0).unwrap();
        (0..n).map(|_| d.sample(&mut rng)).collect()
    }

    #[test]
    fn mixed_chains_have_rhat_near_one() {
        let chains = vec![iid(1, 500, 0.0), iid(2, 500, 0.0), iid(3, 500, 0.0)];
        let r = split_rhat(&chains);
        assert!(r < 1.02, "rhat {r}");
        let e = ess(&chains);
        assert!(e > 600.0, "ess {e}");
    }

    #[test]
    fn separated_chains_are_flagged() {
        let chains = vec![iid(1, 200, 0.0), iid(2, 200, 5.0)];
        assert!(split_rhat(&chains) > 1.5);
    }

    #[test]
    fn constant_chains_do_not_blow_up() {
        let chains = vec![vec![3.0; 20], vec![3.0; 20]];
        assert_eq!(split_rhat(&chains), 1.0);
        assert!(split_rhat(&[vec![1.0, 2.0]]).is_nan());
    }

    #[test]
    fn diagnose_reports_divergences() {
        let draws: Vec<Draw> = (0..10)
            .map(|i| Draw {
                tau: 5,
                mu_1: i as f64 * 0.1,
                mu_2: 1.0,
                sigma: 0.5,
            })
            .collect();
        let samples = PosteriorSamples {
            chains: vec![ChainTrace {
                chain: 0,
                draws,
                stats: ChainStats {
                    divergences: 3,
                    ..ChainStats::default()
                },
            }],
        };
        let d = diagnose(&samples);
        assert_eq!(d.divergences, 3);
        assert_eq!(d.params.len(), 4);
        assert!(d.warnings().iter().any(|w| w.contains("3 divergent")));
        assert!(d.get(Param::Tau).is_some());
    }
}
