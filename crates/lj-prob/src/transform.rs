//! Marginal quantile-to-normal transforms.
//!
//! Kernel density estimation with a shared bandwidth behaves poorly on
//! skewed or heavy-tailed marginals. The [`QuantileNormalTransform`] maps
//! each dimension through its empirical CDF composed with the standard-normal
//! inverse CDF, so every marginal is approximately `N(0, 1)` after the map.
//! The transform is monotone and invertible on the fitted support; the
//! forward map fitted at fit time is reused verbatim for later evaluations
//! (it is never refit on new data, which would silently break normalization).

use crate::math::standard_normal_logpdf;
use lj_core::{Error, Result};
use statrs::distribution::{ContinuousCDF, Normal};

/// Default number of quantile knots kept per dimension.
pub const DEFAULT_MAX_KNOTS: usize = 1000;

/// Clip applied to CDF values before the normal inverse CDF, so extreme
/// quantiles map to finite z rather than +/-inf.
const P_CLIP: f64 = 1e-7;

/// One fitted marginal: strictly increasing quantile knots with their
/// cumulative probabilities.
#[derive(Debug, Clone)]
struct Marginal {
    values: Vec<f64>,
    probs: Vec<f64>,
}

impl Marginal {
    fn fit(xs: &[f64], max_knots: usize) -> Result<Self> {
        if xs.len() < 2 {
            return Err(Error::Validation(format!(
                "need at least 2 samples to fit a quantile transform, got {}",
                xs.len()
            )));
        }
        let mut sorted = xs.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        if sorted[0] == sorted[n - 1] {
            return Err(Error::Validation(
                "marginal is constant; cannot fit a quantile transform".into(),
            ));
        }

        let m = max_knots.max(2).min(n.max(2));
        let grid_p = |k: usize| k as f64 / (m as f64 - 1.0);

        // Collapse runs of equal quantile values into a single knot carrying
        // the mean cumulative probability of the run, so `values` stays
        // strictly increasing and interpolation is well defined.
        let mut values = Vec::with_capacity(m);
        let mut probs = Vec::with_capacity(m);
        let mut k = 0usize;
        while k < m {
            let v = quantile_sorted(&sorted, grid_p(k));
            let mut p_sum = grid_p(k);
            let mut count = 1.0f64;
            let mut j = k + 1;
            while j < m && quantile_sorted(&sorted, grid_p(j)) <= v {
                p_sum += grid_p(j);
                count += 1.0;
                j += 1;
            }
            values.push(v);
            probs.push(p_sum / count);
            k = j;
        }

        if values.len() < 2 {
            return Err(Error::Validation(
                "marginal is (numerically) constant; cannot fit a quantile transform".into(),
            ));
        }

        Ok(Self { values, probs })
    }

    fn support(&self) -> (f64, f64) {
        (self.values[0], *self.values.last().expect("fitted marginal has knots"))
    }

    /// Empirical CDF value and local slope `dP/dx` at `x`.
    fn cdf_and_slope(&self, x: f64) -> Result<(f64, f64)> {
        if !x.is_finite() {
            return Err(Error::ScoreEvaluation(format!("non-finite value {x}")));
        }
        let (lo, hi) = self.support();
        if x < lo || x > hi {
            return Err(Error::ScoreEvaluation(format!(
                "value {x} outside fitted support [{lo}, {hi}]"
            )));
        }
        // First knot strictly greater than x; x == hi falls back to the last segment.
        let i = self.values.partition_point(|v| *v <= x).min(self.values.len() - 1).max(1);
        let (v0, v1) = (self.values[i - 1], self.values[i]);
        let (p0, p1) = (self.probs[i - 1], self.probs[i]);
        let slope = (p1 - p0) / (v1 - v0);
        let f = ((x - v0) / (v1 - v0)).clamp(0.0, 1.0);
        Ok((p0 + f * (p1 - p0), slope))
    }

    fn forward(&self, x: f64, normal: &Normal) -> Result<f64> {
        let (p, _) = self.cdf_and_slope(x)?;
        Ok(normal.inverse_cdf(p.clamp(P_CLIP, 1.0 - P_CLIP)))
    }

    /// Forward map plus `log|dz/dx|` for density bookkeeping.
    fn forward_log_det(&self, x: f64, normal: &Normal) -> Result<(f64, f64)> {
        let (p, slope) = self.cdf_and_slope(x)?;
        let z = normal.inverse_cdf(p.clamp(P_CLIP, 1.0 - P_CLIP));
        // dz/dx = P'(x) / phi(z)
        let log_det = slope.ln() - standard_normal_logpdf(z);
        Ok((z, log_det))
    }

    fn inverse(&self, z: f64, normal: &Normal) -> Result<f64> {
        if !z.is_finite() {
            return Err(Error::ScoreEvaluation(format!("non-finite transformed value {z}")));
        }
        let p_lo = self.probs[0];
        let p_hi = *self.probs.last().expect("fitted marginal has knots");
        let p = normal.cdf(z).clamp(p_lo, p_hi);
        let i = self.probs.partition_point(|q| *q <= p).min(self.probs.len() - 1).max(1);
        let (p0, p1) = (self.probs[i - 1], self.probs[i]);
        let (v0, v1) = (self.values[i - 1], self.values[i]);
        let f = ((p - p0) / (p1 - p0)).clamp(0.0, 1.0);
        Ok(v0 + f * (v1 - v0))
    }
}

/// Interpolating quantile of an already sorted slice.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let q = q.clamp(0.0, 1.0);
    let n = sorted.len() as f64;
    let pos = q * (n - 1.0);
    let i0 = pos.floor() as usize;
    let i1 = pos.ceil() as usize;
    if i0 == i1 {
        return sorted[i0];
    }
    let f = pos - i0 as f64;
    sorted[i0] * (1.0 - f) + sorted[i1] * f
}

/// Per-dimension quantile-to-normal transform, fit once and then frozen.
#[derive(Debug, Clone)]
pub struct QuantileNormalTransform {
    marginals: Vec<Marginal>,
    normal: Normal,
}

impl QuantileNormalTransform {
    /// Fit one marginal transform per column.
    pub fn fit(columns: &[&[f64]], max_knots: usize) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::Validation("cannot fit a transform over zero columns".into()));
        }
        let marginals =
            columns.iter().map(|col| Marginal::fit(col, max_knots)).collect::<Result<Vec<_>>>()?;
        let normal = Normal::new(0.0, 1.0).expect("Normal(0,1) should be valid");
        Ok(Self { marginals, normal })
    }

    /// Number of fitted dimensions.
    pub fn n_dims(&self) -> usize {
        self.marginals.len()
    }

    /// Fitted support `(low, high)` of dimension `d`.
    pub fn support(&self, d: usize) -> (f64, f64) {
        self.marginals[d].support()
    }

    /// Map one row to transformed space.
    pub fn forward(&self, x: &[f64], z_out: &mut [f64]) -> Result<()> {
        debug_assert_eq!(x.len(), self.n_dims());
        for (d, (&xi, zi)) in x.iter().zip(z_out.iter_mut()).enumerate() {
            *zi = self.marginals[d].forward(xi, &self.normal).map_err(|e| dim_context(d, e))?;
        }
        Ok(())
    }

    /// Map one row to transformed space, returning the summed
    /// `log|det dz/dx|` of the map at that row.
    pub fn forward_log_det(&self, x: &[f64], z_out: &mut [f64]) -> Result<f64> {
        debug_assert_eq!(x.len(), self.n_dims());
        let mut log_det = 0.0;
        for (d, (&xi, zi)) in x.iter().zip(z_out.iter_mut()).enumerate() {
            let (z, ld) =
                self.marginals[d].forward_log_det(xi, &self.normal).map_err(|e| dim_context(d, e))?;
            *zi = z;
            log_det += ld;
        }
        Ok(log_det)
    }

    /// Map one transformed row back to the original space.
    ///
    /// The inverse clamps to the fitted support, so draws from a kernel tail
    /// land on the support boundary rather than outside it.
    pub fn inverse(&self, z: &[f64], x_out: &mut [f64]) -> Result<()> {
        debug_assert_eq!(z.len(), self.n_dims());
        for (d, (&zi, xi)) in z.iter().zip(x_out.iter_mut()).enumerate() {
            *xi = self.marginals[d].inverse(zi, &self.normal).map_err(|e| dim_context(d, e))?;
        }
        Ok(())
    }
}

fn dim_context(d: usize, e: Error) -> Error {
    match e {
        Error::ScoreEvaluation(msg) => Error::ScoreEvaluation(format!("dimension {d}: {msg}")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal as RandNormal};

    fn skewed_sample(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let normal = RandNormal::new(0.0, 1.0).unwrap();
        (0..n).map(|_| f64::exp(normal.sample(&mut rng))).collect()
    }

    #[test]
    fn test_roundtrip_on_fitted_support() {
        let xs = skewed_sample(500, 1);
        let t = QuantileNormalTransform::fit(&[&xs], DEFAULT_MAX_KNOTS).unwrap();
        let (lo, hi) = t.support(0);
        let mut z = [0.0];
        let mut back = [0.0];
        // Interior of the support; the two extreme order statistics sit on
        // the CDF clip and only roundtrip approximately.
        for &x in xs.iter().filter(|&&x| x > lo && x < hi).take(100) {
            t.forward(&[x], &mut z).unwrap();
            t.inverse(&z, &mut back).unwrap();
            let diff = (x - back[0]).abs();
            let scale = x.abs().max(1.0);
            assert!(diff / scale < 1e-6, "roundtrip failed: x={x}, z={}, back={}", z[0], back[0]);
        }
        for &x in &[lo, hi] {
            t.forward(&[x], &mut z).unwrap();
            t.inverse(&z, &mut back).unwrap();
            let diff = (x - back[0]).abs();
            assert!(diff / x.abs().max(1.0) < 1e-3, "boundary roundtrip: x={x}, back={}", back[0]);
        }
    }

    #[test]
    fn test_forward_normalizes_skewed_marginal() {
        let xs = skewed_sample(4000, 2);
        let t = QuantileNormalTransform::fit(&[&xs], DEFAULT_MAX_KNOTS).unwrap();
        let mut z = [0.0];
        let mut sum = 0.0;
        let mut sum2 = 0.0;
        for &x in &xs {
            t.forward(&[x], &mut z).unwrap();
            sum += z[0];
            sum2 += z[0] * z[0];
        }
        let n = xs.len() as f64;
        let mean = sum / n;
        let var = sum2 / n - mean * mean;
        assert!(mean.abs() < 0.05, "transformed mean should be ~0: {mean}");
        assert!((var - 1.0).abs() < 0.1, "transformed variance should be ~1: {var}");
    }

    #[test]
    fn test_out_of_support_is_score_error() {
        let xs: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let t = QuantileNormalTransform::fit(&[&xs], DEFAULT_MAX_KNOTS).unwrap();
        let mut z = [0.0];
        let err = t.forward(&[-1.0], &mut z).unwrap_err();
        assert!(matches!(err, Error::ScoreEvaluation(_)), "got {err:?}");
        let err = t.forward(&[f64::NAN], &mut z).unwrap_err();
        assert!(matches!(err, Error::ScoreEvaluation(_)), "got {err:?}");
    }

    #[test]
    fn test_inverse_clamps_extreme_z_to_support() {
        let xs: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let t = QuantileNormalTransform::fit(&[&xs], DEFAULT_MAX_KNOTS).unwrap();
        let mut x = [0.0];
        t.inverse(&[30.0], &mut x).unwrap();
        assert!((x[0] - 99.0).abs() < 1e-9, "extreme z should clamp to max: {}", x[0]);
        t.inverse(&[-30.0], &mut x).unwrap();
        assert!((x[0] - 0.0).abs() < 1e-9, "extreme z should clamp to min: {}", x[0]);
    }

    #[test]
    fn test_constant_column_rejected() {
        let xs = vec![3.0; 50];
        let err = QuantileNormalTransform::fit(&[&xs], DEFAULT_MAX_KNOTS).unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got {err:?}");
    }

    #[test]
    fn test_log_det_matches_finite_difference() {
        let xs = skewed_sample(2000, 3);
        let t = QuantileNormalTransform::fit(&[&xs], DEFAULT_MAX_KNOTS).unwrap();
        let mut z = [0.0];
        let mut z_plus = [0.0];
        let mut z_minus = [0.0];
        // Interior points, away from knot boundaries.
        for &x in &[0.8, 1.0, 1.5, 2.0] {
            let log_det = t.forward_log_det(&[x], &mut z).unwrap();
            let eps = 1e-6;
            t.forward(&[x + eps], &mut z_plus).unwrap();
            t.forward(&[x - eps], &mut z_minus).unwrap();
            let fd = ((z_plus[0] - z_minus[0]) / (2.0 * eps)).ln();
            // Piecewise-linear CDF: exact inside a segment, kinked at knots.
            assert!(
                (log_det - fd).abs() < 1e-2,
                "log|dz/dx| at {x}: analytical={log_det}, fd={fd}"
            );
        }
    }

    #[test]
    fn test_repeated_forward_is_deterministic() {
        // The fit-time transform must be reused: mapping the same value twice
        // gives bit-identical results.
        let xs = skewed_sample(300, 4);
        let t = QuantileNormalTransform::fit(&[&xs], DEFAULT_MAX_KNOTS).unwrap();
        let mut z1 = [0.0];
        let mut z2 = [0.0];
        t.forward(&[xs[10]], &mut z1).unwrap();
        t.forward(&[xs[10]], &mut z2).unwrap();
        assert_eq!(z1[0].to_bits(), z2[0].to_bits());
    }
}
