//! Analytic one-dimensional priors and independent products of them.
//!
//! The standard compact-binary analysis prior factorizes over parameters:
//! uniform boxes, normals, `sin`/`cos` angular priors, and power laws. An
//! [`IndependentPriorSet`] bundles one such marginal per named parameter and
//! implements [`PriorModel`] for table-at-a-time evaluation.

use crate::math::standard_normal_logpdf;
use lj_core::{Error, ParameterSet, PriorModel, Result, SampleTable};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// One-dimensional analytic prior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Prior {
    /// Uniform on `[low, high]`.
    Uniform {
        /// Lower edge.
        low: f64,
        /// Upper edge.
        high: f64,
    },
    /// Normal with mean `mu` and standard deviation `sigma`.
    Normal {
        /// Mean.
        mu: f64,
        /// Standard deviation (> 0).
        sigma: f64,
    },
    /// `p(x) = sin(x) / 2` on `[0, pi]` (isotropic tilt angles).
    Sine,
    /// `p(x) = cos(x) / 2` on `[-pi/2, pi/2]` (isotropic declination).
    Cosine,
    /// `p(x) ∝ x^alpha` on `[low, high]` with `0 < low < high`.
    PowerLaw {
        /// Exponent.
        alpha: f64,
        /// Lower edge (> 0).
        low: f64,
        /// Upper edge.
        high: f64,
    },
}

impl Prior {
    /// Check the shape parameters once, at construction of a prior set.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Prior::Uniform { low, high } => {
                if !low.is_finite() || !high.is_finite() || low >= high {
                    return Err(Error::Validation(format!(
                        "uniform prior requires finite low < high, got ({low}, {high})"
                    )));
                }
            }
            Prior::Normal { mu, sigma } => {
                if !mu.is_finite() || !sigma.is_finite() || sigma <= 0.0 {
                    return Err(Error::Validation(format!(
                        "normal prior requires finite mu and sigma > 0, got ({mu}, {sigma})"
                    )));
                }
            }
            Prior::Sine | Prior::Cosine => {}
            Prior::PowerLaw { alpha, low, high } => {
                if !alpha.is_finite() || !low.is_finite() || !high.is_finite() {
                    return Err(Error::Validation("power-law prior requires finite shape".into()));
                }
                if low <= 0.0 || low >= high {
                    return Err(Error::Validation(format!(
                        "power-law prior requires 0 < low < high, got ({low}, {high})"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Normalized log-density at `x`; `-inf` outside the support.
    pub fn log_prob(&self, x: f64) -> f64 {
        match *self {
            Prior::Uniform { low, high } => {
                if x < low || x > high {
                    f64::NEG_INFINITY
                } else {
                    -(high - low).ln()
                }
            }
            Prior::Normal { mu, sigma } => {
                standard_normal_logpdf((x - mu) / sigma) - sigma.ln()
            }
            Prior::Sine => {
                if x <= 0.0 || x >= PI {
                    f64::NEG_INFINITY
                } else {
                    x.sin().ln() - 2f64.ln()
                }
            }
            Prior::Cosine => {
                if x <= -FRAC_PI_2 || x >= FRAC_PI_2 {
                    f64::NEG_INFINITY
                } else {
                    x.cos().ln() - 2f64.ln()
                }
            }
            Prior::PowerLaw { alpha, low, high } => {
                if x < low || x > high {
                    return f64::NEG_INFINITY;
                }
                let log_norm = if (alpha + 1.0).abs() < 1e-12 {
                    (high / low).ln().ln()
                } else {
                    ((high.powf(alpha + 1.0) - low.powf(alpha + 1.0)) / (alpha + 1.0)).ln()
                };
                alpha * x.ln() - log_norm
            }
        }
    }
}

/// Product of independent one-dimensional priors, one per named parameter.
#[derive(Debug, Clone)]
pub struct IndependentPriorSet {
    params: ParameterSet,
    priors: Vec<Prior>,
}

impl IndependentPriorSet {
    /// Build a prior set from `(name, prior)` pairs, in evaluation order.
    pub fn new<S: Into<String>>(entries: impl IntoIterator<Item = (S, Prior)>) -> Result<Self> {
        let (names, priors): (Vec<String>, Vec<Prior>) =
            entries.into_iter().map(|(n, p)| (n.into(), p)).unzip();
        for prior in &priors {
            prior.validate()?;
        }
        let params = ParameterSet::new(names)?;
        Ok(Self { params, priors })
    }

    /// Same uniform box prior on every parameter of `params`.
    pub fn uniform_box(params: &ParameterSet, low: f64, high: f64) -> Result<Self> {
        Self::new(
            params.names().iter().map(|n| (n.clone(), Prior::Uniform { low, high })),
        )
    }

    /// The marginal prior of `name`, if declared.
    pub fn marginal(&self, name: &str) -> Option<&Prior> {
        self.params.index_of(name).map(|i| &self.priors[i])
    }
}

impl PriorModel for IndependentPriorSet {
    fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    fn log_prob(
        &self,
        table: &SampleTable,
        restrict_to: Option<&ParameterSet>,
    ) -> Result<Vec<f64>> {
        let names: Vec<&String> = match restrict_to {
            Some(subset) => subset.names().iter().collect(),
            None => self.params.names().iter().collect(),
        };

        let mut out = vec![0.0f64; table.n_rows()];
        for name in names {
            let idx = self.params.index_of(name).ok_or_else(|| {
                Error::Validation(format!("prior has no parameter '{name}'"))
            })?;
            let col = table.column(name).ok_or_else(|| Error::DimensionMismatch {
                expected: self.params.joined(),
                got: table.params().joined(),
            })?;
            let prior = &self.priors[idx];
            for (o, &x) in out.iter_mut().zip(col) {
                *o += prior.log_prob(x);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::LN_SQRT_2PI;

    #[test]
    fn test_uniform_normalization() {
        let p = Prior::Uniform { low: -5.0, high: 5.0 };
        assert!((p.log_prob(0.0) - (-(10.0f64).ln())).abs() < 1e-15);
        assert_eq!(p.log_prob(5.1), f64::NEG_INFINITY);
    }

    #[test]
    fn test_normal_logpdf_matches_closed_form() {
        let p = Prior::Normal { mu: 1.0, sigma: 2.0 };
        let x = 2.0;
        let expected = -0.5 * (0.5f64).powi(2) - (2.0f64).ln() - LN_SQRT_2PI;
        assert!((p.log_prob(x) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_sine_peak_and_support() {
        let p = Prior::Sine;
        assert!((p.log_prob(FRAC_PI_2) - (0.5f64).ln()).abs() < 1e-12);
        assert_eq!(p.log_prob(-0.1), f64::NEG_INFINITY);
        assert_eq!(p.log_prob(PI + 0.1), f64::NEG_INFINITY);
    }

    #[test]
    fn test_power_law_flat_in_log_for_alpha_minus_one() {
        let p = Prior::PowerLaw { alpha: -1.0, low: 1.0, high: f64::exp(1.0) };
        // Normalization is 1/ln(high/low) = 1; log p(x) = -ln x.
        assert!((p.log_prob(1.0) - 0.0).abs() < 1e-10);
        assert!((p.log_prob(2.0) + 2.0f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn test_invalid_shapes_rejected() {
        assert!(Prior::Uniform { low: 1.0, high: 1.0 }.validate().is_err());
        assert!(Prior::Normal { mu: 0.0, sigma: 0.0 }.validate().is_err());
        assert!(Prior::PowerLaw { alpha: 2.0, low: 0.0, high: 1.0 }.validate().is_err());
    }

    #[test]
    fn test_prior_set_restricted_evaluation() {
        let set = IndependentPriorSet::new([
            ("x", Prior::Uniform { low: -5.0, high: 5.0 }),
            ("y", Prior::Uniform { low: -5.0, high: 5.0 }),
        ])
        .unwrap();

        let table = SampleTable::from_rows(
            ParameterSet::new(["x", "y"]).unwrap(),
            &[vec![0.0, 0.0], vec![0.0, 6.0]],
        )
        .unwrap();

        let full = set.log_prob(&table, None).unwrap();
        assert!((full[0] - 2.0 * -(10.0f64).ln()).abs() < 1e-12);
        assert_eq!(full[1], f64::NEG_INFINITY);

        let only_x = ParameterSet::new(["x"]).unwrap();
        let restricted = set.log_prob(&table, Some(&only_x)).unwrap();
        assert!((restricted[1] - -(10.0f64).ln()).abs() < 1e-12, "y must not contribute");
    }

    #[test]
    fn test_missing_column_is_dimension_mismatch() {
        let set =
            IndependentPriorSet::new([("x", Prior::Uniform { low: 0.0, high: 1.0 })]).unwrap();
        let table = SampleTable::from_rows(
            ParameterSet::new(["y"]).unwrap(),
            &[vec![0.5]],
        )
        .unwrap();
        let err = set.log_prob(&table, None).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }), "got {err:?}");
    }

    #[test]
    fn test_prior_json_roundtrip() {
        let p: Prior = serde_json::from_str(r#"{"type":"uniform","low":-5.0,"high":5.0}"#).unwrap();
        assert_eq!(p, Prior::Uniform { low: -5.0, high: 5.0 });
    }
}
