//! Pooling and refitting of weighted composite samples.
//!
//! The builder concatenates every anchor's composite rows into one pool
//! (pooling is exchangeable, so image order is irrelevant), converts the log
//! importance weights into normalized weights with a max-shifted
//! exponentiation, and refits a [`DensityModel`] over the target parameter
//! set. Raw pooled artifacts are returned alongside the fitted model so
//! callers can diagnose weight degeneracy themselves.

use crate::density::{DensityConfig, DensityModel};
use crate::weights::WeightedComposite;
use lj_core::{Error, ParameterSet, Result, SampleTable};

/// Default weight-degeneracy threshold: effective sample size below this
/// fraction of the pool flags the result.
pub const DEFAULT_ESS_THRESHOLD: f64 = 0.01;

/// Effective-sample-size diagnostics of the pooled importance weights.
#[derive(Debug, Clone, Copy)]
pub struct WeightDiagnostics {
    /// Kish effective sample size `1 / sum(w_i^2)` of the normalized weights.
    pub effective_sample_size: f64,
    /// `effective_sample_size / n_pooled`.
    pub ess_fraction: f64,
    /// Threshold fraction below which `degenerate` is set.
    pub threshold_fraction: f64,
    /// Whether the weights are dominated by a few samples.
    pub degenerate: bool,
}

/// Result of a joint analysis: the fitted joint density plus the raw pooled
/// artifacts it was built from.
pub struct JointEstimate {
    /// Joint density model over the target parameter set.
    pub density: DensityModel,
    /// Pooled rows, one per proposal draw across all anchors.
    pub pooled_samples: SampleTable,
    /// Log importance weight of every pooled row (unnormalized).
    pub pooled_log_weights: Vec<f64>,
    /// Weight-degeneracy diagnostics (informative, never fatal).
    pub diagnostics: WeightDiagnostics,
}

/// Pools per-anchor weighted composites and refits the joint density.
pub struct JointEstimateBuilder {
    density_config: DensityConfig,
    ess_threshold_fraction: f64,
}

impl JointEstimateBuilder {
    /// Builder with the given density configuration and the default
    /// degeneracy threshold.
    pub fn new(density_config: DensityConfig) -> Self {
        Self { density_config, ess_threshold_fraction: DEFAULT_ESS_THRESHOLD }
    }

    /// Override the weight-degeneracy threshold (fraction of the pool).
    pub fn with_ess_threshold(mut self, fraction: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(Error::Validation(format!(
                "ESS threshold must be within [0, 1], got {fraction}"
            )));
        }
        self.ess_threshold_fraction = fraction;
        Ok(self)
    }

    /// Pool all composites, normalize the weights and refit over `target`.
    pub fn build(
        &self,
        parts: &[WeightedComposite],
        target: &ParameterSet,
    ) -> Result<JointEstimate> {
        if parts.is_empty() {
            return Err(Error::Validation("cannot build a joint estimate from zero images".into()));
        }

        let mut blocks = Vec::with_capacity(parts.len());
        let mut pooled_log_weights = Vec::new();
        for part in parts {
            if part.log_weights.len() != part.composite.n_rows() {
                return Err(Error::RowCountMismatch {
                    expected: part.composite.n_rows(),
                    got: part.log_weights.len(),
                    context: format!("log-weights of anchor {}", part.composite.anchor_index()),
                });
            }
            blocks.push(part.composite.table().select(target)?);
            pooled_log_weights.extend_from_slice(&part.log_weights);
        }
        let block_refs: Vec<&SampleTable> = blocks.iter().collect();
        let pooled_samples = SampleTable::concat(&block_refs)?;

        let weights = normalized_weights(&pooled_log_weights)?;
        let ess = effective_sample_size(&weights);
        let n = weights.len() as f64;
        let ess_fraction = ess / n;
        let diagnostics = WeightDiagnostics {
            effective_sample_size: ess,
            ess_fraction,
            threshold_fraction: self.ess_threshold_fraction,
            degenerate: ess_fraction < self.ess_threshold_fraction,
        };

        let mut density = DensityModel::with_config(target.clone(), self.density_config);
        density.fit(&pooled_samples, Some(&weights))?;

        Ok(JointEstimate { density, pooled_samples, pooled_log_weights, diagnostics })
    }
}

/// Convert log-weights to normalized non-negative weights summing to 1.
///
/// The exponentiation is shifted by the maximum log-weight so wide dynamic
/// ranges neither overflow nor underflow wholesale. Rows at `-inf` come out
/// exactly 0. Fails if any log-weight is NaN or `+inf`, or if every row is
/// `-inf` (no mass to normalize).
pub fn normalized_weights(log_weights: &[f64]) -> Result<Vec<f64>> {
    if log_weights.is_empty() {
        return Err(Error::Validation("cannot normalize zero log-weights".into()));
    }
    if log_weights.iter().any(|w| w.is_nan()) {
        return Err(Error::Validation("log-weights contain NaN".into()));
    }
    if log_weights.iter().any(|&w| w == f64::INFINITY) {
        return Err(Error::Validation("log-weights contain +inf".into()));
    }
    let shift = log_weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !shift.is_finite() {
        return Err(Error::Validation(
            "all log-weights are -inf; the pooled sample carries no weight".into(),
        ));
    }
    let mut weights: Vec<f64> = log_weights.iter().map(|&w| (w - shift).exp()).collect();
    let sum: f64 = weights.iter().sum();
    // sum >= 1 because the max-shifted term is exp(0).
    for w in &mut weights {
        *w /= sum;
    }
    Ok(weights)
}

/// Kish effective sample size of already-normalized weights.
pub fn effective_sample_size(normalized: &[f64]) -> f64 {
    let sum_sq: f64 = normalized.iter().map(|&w| w * w).sum();
    if sum_sq <= 0.0 {
        return 0.0;
    }
    1.0 / sum_sq
}
