//! Log-densities for the priors and likelihood.

use std::f64::consts::PI;

/// `ln(1 / sqrt(2π))`.
pub const LN_INV_SQRT_2PI: f64 = -0.918_938_533_204_672_8;

/// Log-density of `Normal(mu, sigma)` at `x`. `-inf` for `sigma <= 0`.
pub fn normal_logpdf(x: f64, mu: f64, sigma: f64) -> f64 {
    if !(sigma > 0.0) {
        return f64::NEG_INFINITY;
    }
    let z = (x - mu) / sigma;
    LN_INV_SQRT_2PI - sigma.ln() - 0.5 * z * z
}

/// Log-density of `HalfNormal(scale)` at `x` (support `x >= 0`).
pub fn half_normal_logpdf(x: f64, scale: f64) -> f64 {
    if x < 0.0 || !(scale > 0.0) {
        return f64::NEG_INFINITY;
    }
    let z = x / scale;
    0.5 * (2.0 / PI).ln() - scale.ln() - 0.5 * z * z
}
