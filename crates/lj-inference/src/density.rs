//! Kernel density model behind a marginal-normalizing transform.
//!
//! A [`DensityModel`] is configured with a [`ParameterSet`] and fitted to a
//! [`SampleTable`]: each marginal is first mapped through a
//! [`QuantileNormalTransform`], then a Gaussian-kernel density with a
//! diagonal, data-driven bandwidth is built over the transformed rows.
//! `sample` and `score` operate in the parameter ordering and transformed
//! space fixed at fit time; the transform is never refit on later inputs.

use lj_core::{Error, ParameterSet, Result, SampleTable};
use lj_prob::math::{standard_normal_logpdf, weighted_mean_var};
use lj_prob::transform::{QuantileNormalTransform, DEFAULT_MAX_KNOTS};
use rand::RngCore;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

/// Bandwidth selection rule, applied per dimension in transformed space.
///
/// Both rules scale as `n^(-1/(d+4))`; a fixed constant would ignore the
/// per-fit scale of the transformed sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandwidthRule {
    /// Silverman's rule of thumb: `h_d = sigma_d * (4 / ((d+2) n))^(1/(d+4))`.
    #[default]
    Silverman,
    /// Scott's rule: `h_d = sigma_d * n^(-1/(d+4))`.
    Scott,
}

impl BandwidthRule {
    /// Multiplier applied to the per-dimension standard deviation.
    pub fn factor(self, n_samples: usize, n_dims: usize) -> f64 {
        let n = n_samples as f64;
        let d = n_dims as f64;
        match self {
            BandwidthRule::Silverman => (4.0 / ((d + 2.0) * n)).powf(1.0 / (d + 4.0)),
            BandwidthRule::Scott => n.powf(-1.0 / (d + 4.0)),
        }
    }
}

/// Configuration of a [`DensityModel`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityConfig {
    /// Bandwidth selection rule.
    #[serde(default)]
    pub bandwidth_rule: BandwidthRule,
    /// Maximum number of quantile knots kept per marginal transform.
    #[serde(default = "default_max_knots")]
    pub max_transform_knots: usize,
}

fn default_max_knots() -> usize {
    DEFAULT_MAX_KNOTS
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self { bandwidth_rule: BandwidthRule::default(), max_transform_knots: DEFAULT_MAX_KNOTS }
    }
}

/// Frozen state of a fitted density model.
#[derive(Debug, Clone)]
struct Fitted {
    transform: QuantileNormalTransform,
    /// Transformed kernel centers, row-major (`centers[k][d]`).
    centers: Vec<Vec<f64>>,
    /// `ln` of the normalized kernel weights (`-inf` for zero-weight rows,
    /// which are retained so shapes stay aligned with the fitting sample).
    log_weights: Vec<f64>,
    /// Cumulative normalized weights for kernel selection while sampling.
    kernel_cdf: Vec<f64>,
    bandwidths: Vec<f64>,
    inv_bandwidths: Vec<f64>,
    log_h_sum: f64,
}

/// Weighted kernel density estimate over a fixed parameter set, fitted in
/// quantile-normalized space.
#[derive(Debug, Clone)]
pub struct DensityModel {
    params: ParameterSet,
    config: DensityConfig,
    fitted: Option<Fitted>,
}

impl DensityModel {
    /// Unfitted model over `params` with default configuration.
    pub fn new(params: ParameterSet) -> Self {
        Self::with_config(params, DensityConfig::default())
    }

    /// Unfitted model over `params` with explicit configuration.
    pub fn with_config(params: ParameterSet, config: DensityConfig) -> Self {
        Self { params, config, fitted: None }
    }

    /// The parameter set the model is defined over.
    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Whether `fit` has completed.
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Per-dimension bandwidths of the fitted kernel (transformed space).
    pub fn bandwidths(&self) -> Result<&[f64]> {
        Ok(&self.require_fitted()?.bandwidths)
    }

    /// Number of kernels in the fitted mixture (equals the fitting row count;
    /// zero-weight rows are retained).
    pub fn n_kernels(&self) -> Result<usize> {
        Ok(self.require_fitted()?.centers.len())
    }

    fn require_fitted(&self) -> Result<&Fitted> {
        self.fitted.as_ref().ok_or_else(|| Error::NotFitted(self.params.joined()))
    }

    fn check_params(&self, sample: &SampleTable) -> Result<()> {
        if sample.params() != &self.params {
            return Err(Error::DimensionMismatch {
                expected: self.params.joined(),
                got: sample.params().joined(),
            });
        }
        Ok(())
    }

    /// Fit the transform and kernel density to `sample`.
    ///
    /// `weights`, if given, must be finite and non-negative with one entry
    /// per row; they are normalized to sum to 1 internally. Rows with zero
    /// weight contribute no density mass but are kept as kernels so the
    /// fitted shapes match the input sample.
    pub fn fit(&mut self, sample: &SampleTable, weights: Option<&[f64]>) -> Result<()> {
        self.check_params(sample)?;
        let n = sample.n_rows();
        let d = self.params.len();
        if n < 2 {
            return Err(Error::Validation(format!(
                "need at least 2 rows to fit a density model, got {n}"
            )));
        }

        let norm_weights: Option<Vec<f64>> = match weights {
            None => None,
            Some(w) => {
                if w.len() != n {
                    return Err(Error::Validation(format!(
                        "weights length mismatch: expected {n}, got {}",
                        w.len()
                    )));
                }
                if w.iter().any(|x| !x.is_finite()) {
                    return Err(Error::Validation("weights must be finite".into()));
                }
                if w.iter().any(|&x| x < 0.0) {
                    return Err(Error::Validation("weights must be >= 0".into()));
                }
                let sum: f64 = w.iter().sum();
                if sum <= 0.0 {
                    return Err(Error::Validation(format!(
                        "sum of weights must be > 0, got {sum}"
                    )));
                }
                Some(w.iter().map(|&x| x / sum).collect())
            }
        };

        // The marginal transforms are fit on the raw (unweighted) sample;
        // weights only shape the kernel mixture.
        let columns = sample.columns();
        let transform = QuantileNormalTransform::fit(&columns, self.config.max_transform_knots)?;

        let mut centers = Vec::with_capacity(n);
        let mut row = vec![0.0f64; d];
        let mut z = vec![0.0f64; d];
        for i in 0..n {
            sample.read_row(i, &mut row);
            transform.forward(&row, &mut z)?;
            centers.push(z.clone());
        }

        let factor = self.config.bandwidth_rule.factor(n, d);
        let mut bandwidths = Vec::with_capacity(d);
        for dim in 0..d {
            let (_, var) =
                weighted_mean_var(centers.iter().map(|c| c[dim]), norm_weights.as_deref());
            let sigma = var.sqrt().max(1e-10);
            bandwidths.push(sigma * factor);
        }
        let inv_bandwidths: Vec<f64> = bandwidths.iter().map(|&h| 1.0 / h).collect();
        let log_h_sum: f64 = bandwidths.iter().map(|h| h.ln()).sum();

        let uniform = 1.0 / n as f64;
        let log_weights: Vec<f64> = match &norm_weights {
            None => vec![uniform.ln(); n],
            Some(w) => w
                .iter()
                .map(|&x| if x > 0.0 { x.ln() } else { f64::NEG_INFINITY })
                .collect(),
        };

        let mut kernel_cdf = Vec::with_capacity(n);
        let mut acc = 0.0f64;
        for k in 0..n {
            acc += norm_weights.as_ref().map(|w| w[k]).unwrap_or(uniform);
            kernel_cdf.push(acc);
        }
        if let Some(last) = kernel_cdf.last_mut() {
            *last = 1.0;
        }

        self.fitted = Some(Fitted {
            transform,
            centers,
            log_weights,
            kernel_cdf,
            bandwidths,
            inv_bandwidths,
            log_h_sum,
        });
        Ok(())
    }

    /// Draw `n` i.i.d. rows from the fitted density.
    ///
    /// Fails with [`Error::NotFitted`] before `fit`.
    pub fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Result<SampleTable> {
        let fitted = self.require_fitted()?;
        let d = self.params.len();

        let mut rows = Vec::with_capacity(n);
        let mut z = vec![0.0f64; d];
        let mut x = vec![0.0f64; d];
        for _ in 0..n {
            let u = u01(rng);
            let k = fitted.kernel_cdf.partition_point(|p| *p < u).min(fitted.centers.len() - 1);
            for dim in 0..d {
                let eps: f64 = StandardNormal.sample(rng);
                z[dim] = fitted.centers[k][dim] + fitted.bandwidths[dim] * eps;
            }
            fitted.transform.inverse(&z, &mut x)?;
            rows.push(x.clone());
        }

        SampleTable::from_rows(self.params.clone(), &rows)
    }

    /// Log-density of every row of `sample` under the fitted model.
    ///
    /// Evaluation maps each row through the fit-time transform (forward only)
    /// and includes the transform's log-Jacobian, so scores are densities in
    /// the original parameter space. Rows outside the fitted support
    /// propagate [`Error::ScoreEvaluation`] rather than silently scoring
    /// `-inf`.
    pub fn score(&self, sample: &SampleTable) -> Result<Vec<f64>> {
        let fitted = self.require_fitted()?;
        self.check_params(sample)?;
        let d = self.params.len();
        let n = sample.n_rows();

        let mut out = Vec::with_capacity(n);
        let mut row = vec![0.0f64; d];
        let mut z = vec![0.0f64; d];
        for i in 0..n {
            sample.read_row(i, &mut row);
            let log_det = fitted.transform.forward_log_det(&row, &mut z)?;

            // Online logsumexp over kernels (m, s): result = m + ln(s).
            let mut m = f64::NEG_INFINITY;
            let mut s = 0.0f64;
            for (center, &log_w) in fitted.centers.iter().zip(&fitted.log_weights) {
                if !log_w.is_finite() {
                    continue;
                }
                let mut t = log_w;
                for dim in 0..d {
                    t += standard_normal_logpdf((z[dim] - center[dim]) * fitted.inv_bandwidths[dim]);
                }
                if t > m {
                    if m.is_finite() {
                        s = s * (m - t).exp() + 1.0;
                    } else {
                        s = 1.0;
                    }
                    m = t;
                } else {
                    s += (t - m).exp();
                }
            }

            let log_kde = if m.is_finite() { m + s.ln() - fitted.log_h_sum } else { f64::NEG_INFINITY };
            out.push(log_kde + log_det);
        }
        Ok(out)
    }
}

/// Uniform draw in (0, 1) from a raw random source.
#[inline]
fn u01(rng: &mut dyn RngCore) -> f64 {
    let v = rng.next_u64();
    (v as f64 + 0.5) * (1.0 / 18446744073709551616.0_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_distr::Normal as RandNormal;

    fn params_xy() -> ParameterSet {
        ParameterSet::new(["x", "y"]).unwrap()
    }

    fn gaussian_table(params: &ParameterSet, mean: &[f64], n: usize, seed: u64) -> SampleTable {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let normal = RandNormal::new(0.0, 1.0).unwrap();
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|_| mean.iter().map(|&mu| mu + normal.sample(&mut rng)).collect())
            .collect();
        SampleTable::from_rows(params.clone(), &rows).unwrap()
    }

    #[test]
    fn test_sample_before_fit_is_not_fitted() {
        let model = DensityModel::new(params_xy());
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let err = model.sample(10, &mut rng).unwrap_err();
        assert!(matches!(err, Error::NotFitted(_)), "got {err:?}");
    }

    #[test]
    fn test_fit_rejects_mismatched_params() {
        let mut model = DensityModel::new(params_xy());
        let other = ParameterSet::new(["a", "b"]).unwrap();
        let table = gaussian_table(&other, &[0.0, 0.0], 50, 1);
        let err = model.fit(&table, None).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }), "got {err:?}");
    }

    #[test]
    fn test_fit_rejects_bad_weights() {
        let params = params_xy();
        let table = gaussian_table(&params, &[0.0, 0.0], 50, 2);
        let mut model = DensityModel::new(params);
        assert!(model.fit(&table, Some(&[1.0; 49])).is_err(), "length mismatch");
        assert!(model.fit(&table, Some(&vec![0.0; 50])).is_err(), "zero total weight");
        let mut neg = vec![1.0; 50];
        neg[3] = -0.5;
        assert!(model.fit(&table, Some(&neg)).is_err(), "negative weight");
    }

    #[test]
    fn test_zero_weight_rows_kept_but_carry_no_mass() {
        let params = ParameterSet::new(["x"]).unwrap();
        // One far-away outlier row, zero-weighted.
        let mut rows: Vec<Vec<f64>> = (0..200).map(|i| vec![(i % 20) as f64 * 0.1]).collect();
        rows.push(vec![10.0]);
        let table = SampleTable::from_rows(params.clone(), &rows).unwrap();
        let mut weights = vec![1.0; 201];
        weights[200] = 0.0;

        let mut zeroed = DensityModel::new(params.clone());
        zeroed.fit(&table, Some(&weights)).unwrap();
        // The kernel is retained, so shapes stay aligned with the input.
        assert_eq!(zeroed.n_kernels().unwrap(), 201);

        let mut unweighted = DensityModel::new(params.clone());
        unweighted.fit(&table, None).unwrap();

        let probe = SampleTable::from_rows(params, &[vec![10.0]]).unwrap();
        let s_zeroed = zeroed.score(&probe).unwrap()[0];
        let s_unweighted = unweighted.score(&probe).unwrap()[0];
        assert!(
            s_unweighted - s_zeroed > 5.0,
            "zero-weight kernel must carry no density mass: {s_zeroed} vs {s_unweighted}"
        );
    }

    #[test]
    fn test_seeded_sampling_is_deterministic() {
        let params = params_xy();
        let table = gaussian_table(&params, &[0.0, 1.0], 300, 3);
        let mut model = DensityModel::new(params);
        model.fit(&table, None).unwrap();

        let mut rng1 = rand::rngs::StdRng::seed_from_u64(42);
        let mut rng2 = rand::rngs::StdRng::seed_from_u64(42);
        let a = model.sample(50, &mut rng1).unwrap();
        let b = model.sample(50, &mut rng2).unwrap();
        assert_eq!(a.column("x").unwrap(), b.column("x").unwrap());
        assert_eq!(a.column("y").unwrap(), b.column("y").unwrap());
    }

    #[test]
    fn test_sample_recovers_mean() {
        let params = params_xy();
        let table = gaussian_table(&params, &[2.0, -1.0], 1500, 4);
        let mut model = DensityModel::new(params);
        model.fit(&table, None).unwrap();

        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        let draws = model.sample(2000, &mut rng).unwrap();
        let mean_x: f64 =
            draws.column("x").unwrap().iter().sum::<f64>() / draws.n_rows() as f64;
        let mean_y: f64 =
            draws.column("y").unwrap().iter().sum::<f64>() / draws.n_rows() as f64;
        assert!((mean_x - 2.0).abs() < 0.15, "mean_x = {mean_x}");
        assert!((mean_y + 1.0).abs() < 0.15, "mean_y = {mean_y}");
    }

    #[test]
    fn test_score_is_repeatable_and_sane() {
        // Scoring the model's own draws twice must agree exactly (the
        // transform is frozen at fit time), and the mean log-density should
        // sit near the negative self-entropy of the underlying Gaussian.
        let params = params_xy();
        let table = gaussian_table(&params, &[0.0, 0.0], 1200, 6);
        let mut model = DensityModel::new(params);
        model.fit(&table, None).unwrap();

        let mut rng = rand::rngs::StdRng::seed_from_u64(8);
        let draws = model.sample(400, &mut rng).unwrap();
        let s1 = model.score(&draws).unwrap();
        let s2 = model.score(&draws).unwrap();
        assert_eq!(s1, s2, "score must reuse the fit-time transform");

        let mean_score: f64 = s1.iter().sum::<f64>() / s1.len() as f64;
        // Entropy of a standard bivariate normal is ~2.84 nats.
        assert!(
            (-4.5..=-1.5).contains(&mean_score),
            "mean log-density should be near -2.84, got {mean_score}"
        );
    }

    #[test]
    fn test_score_out_of_support_errors() {
        let params = ParameterSet::new(["x"]).unwrap();
        let table = SampleTable::from_columns(
            params.clone(),
            vec![(0..100).map(|i| i as f64 * 0.01).collect()],
        )
        .unwrap();
        let mut model = DensityModel::new(params.clone());
        model.fit(&table, None).unwrap();

        let probe = SampleTable::from_rows(params, &[vec![50.0]]).unwrap();
        let err = model.score(&probe).unwrap_err();
        assert!(matches!(err, Error::ScoreEvaluation(_)), "got {err:?}");
    }

    #[test]
    fn test_weighted_fit_shifts_mass() {
        let params = ParameterSet::new(["x"]).unwrap();
        let mut rows = Vec::new();
        for i in 0..200 {
            rows.push(vec![-1.0 + (i % 10) as f64 * 0.01]);
            rows.push(vec![1.0 + (i % 10) as f64 * 0.01]);
        }
        let table = SampleTable::from_rows(params.clone(), &rows).unwrap();
        // Upweight the cluster at +1 by 9:1.
        let weights: Vec<f64> =
            (0..table.n_rows()).map(|i| if i % 2 == 0 { 0.1 } else { 0.9 }).collect();

        let mut model = DensityModel::new(params);
        model.fit(&table, Some(&weights)).unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        let draws = model.sample(1000, &mut rng).unwrap();
        let mean: f64 = draws.column("x").unwrap().iter().sum::<f64>() / 1000.0;
        assert!(mean > 0.5, "weighted fit should pull the mean toward +1, got {mean}");
    }

    #[test]
    fn test_bandwidth_factor_shrinks_with_n() {
        for rule in [BandwidthRule::Silverman, BandwidthRule::Scott] {
            let f_small = rule.factor(100, 2);
            let f_large = rule.factor(10_000, 2);
            assert!(
                f_large < f_small,
                "{rule:?}: factor must shrink with n ({f_large} vs {f_small})"
            );
        }
    }
}
