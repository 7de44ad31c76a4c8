//! Descriptive statistics over `f64` slices.
//!
//! Conventions follow the usual numerical-Python defaults so results match
//! analyst notebooks: population standard deviation (`ddof = 0`) and linear
//! interpolation between order statistics for quantiles.

/// Arithmetic mean (`None` for an empty slice).
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (`ddof = 0`).
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Sample variance (`ddof = 1`). `None` for fewer than two values.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    Some(values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0))
}

/// Quantile `q ∈ [0, 1]` with linear interpolation between order statistics.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !q.is_finite() {
        return None;
    }
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() as f64 - 1.0);
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Round to a fixed number of decimals (half away from zero).
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// Running sums of `x` and `x²`, for O(1) segment statistics.
#[derive(Debug, Clone)]
pub struct PrefixSums {
    s1: Vec<f64>,
    s2: Vec<f64>,
}

/// Count, sum, and sum of squares over a half-open index range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub count: f64,
    pub sum: f64,
    pub sum_sq: f64,
}

impl Segment {
    /// `Σ (x_i − mu)²` over the segment.
    pub fn sse(&self, mu: f64) -> f64 {
        (self.sum_sq - 2.0 * mu * self.sum + self.count * mu * mu).max(0.0)
    }
}

impl PrefixSums {
    pub fn new(values: &[f64]) -> Self {
        let mut s1 = Vec::with_capacity(values.len() + 1);
        let mut s2 = Vec::with_capacity(values.len() + 1);
        s1.push(0.0);
        s2.push(0.0);
        let (mut a, mut b) = (0.0, 0.0);
        for &v in values {
            a += v;
            b += v * v;
            s1.push(a);
            s2.push(b);
        }
        Self { s1, s2 }
    }

    pub fn len(&self) -> usize {
        self.s1.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Statistics of `values[start..end]`. Bounds are clamped to the series.
    pub fn segment(&self, start: usize, end: usize) -> Segment {
        let n = self.len();
        let end = end.min(n);
        let start = start.min(end);
        Segment {
            count: (end - start) as f64,
            sum: self.s1[end] - self.s1[start],
            sum_sq: self.s2[end] - self.s2[start],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_std_uses_n_denominator() {
        let v = [1.0, 2.0, 3.0, 4.0];
        let s = population_std(&v).unwrap();
        assert!((s - 1.25f64.sqrt()).abs() < 1e-12);
        assert!(sample_variance(&[1.0]).is_none());
    }

    #[test]
    fn quantile_interpolates() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert!((quantile(&v, 0.5).unwrap() - 2.5).abs() < 1e-12);
        assert!((quantile(&v, 0.0).unwrap() - 1.0).abs() < 1e-12);
        assert!((quantile(&v, 1.0).unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn round_to_fixed_decimals() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(-12.345, 2), -12.35);
        assert_eq!(round_to(3.0, 2), 3.0);
    }

    #[test]
    fn segment_sse_matches_direct_sum() {
        let v = [0.5, -1.0, 2.0, 3.5, 0.0];
        let ps = PrefixSums::new(&v);
        let seg = ps.segment(1, 4);
        let mu = 1.2;
        let direct: f64 = v[1..4].iter().map(|x| (x - mu).powi(2)).sum();
        assert_eq!(seg.count, 3.0);
        assert!((seg.sse(mu) - direct).abs() < 1e-12);

        let empty = ps.segment(3, 3);
        assert_eq!(empty.count, 0.0);
        assert_eq!(empty.sse(mu), 0.0);
    }
}
