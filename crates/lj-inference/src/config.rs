//! Joint-analysis run configuration.

use crate::density::{BandwidthRule, DensityConfig};
use crate::joint::DEFAULT_ESS_THRESHOLD;
use lj_core::{Error, ParameterSet, Result};
use serde::{Deserialize, Serialize};

/// Recognized options of a joint analysis run.
///
/// Parameter sets are plain name lists here (the serializable boundary);
/// they are promoted to [`ParameterSet`]s, with uniqueness and subset checks,
/// before any computation starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointAnalysisConfig {
    /// Ordered names of the full parameter set.
    pub full_parameter_set: Vec<String>,
    /// Ordered names of the effective parameter set (subset of full).
    pub effective_parameter_set: Vec<String>,
    /// Proposal draws per image per round (> 0).
    pub n_samples_per_image: usize,
    /// Bandwidth selection rule for every density fit.
    #[serde(default)]
    pub bandwidth_rule: BandwidthRule,
    /// Seed for reproducible runs; `None` draws fresh entropy.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Weight-degeneracy threshold as a fraction of the pooled sample count.
    #[serde(default = "default_ess_threshold")]
    pub ess_threshold: f64,
}

fn default_ess_threshold() -> f64 {
    DEFAULT_ESS_THRESHOLD
}

impl JointAnalysisConfig {
    /// The full parameter set.
    pub fn full_params(&self) -> Result<ParameterSet> {
        ParameterSet::new(self.full_parameter_set.iter().cloned())
    }

    /// The effective parameter set.
    pub fn effective_params(&self) -> Result<ParameterSet> {
        ParameterSet::new(self.effective_parameter_set.iter().cloned())
    }

    /// Density-model configuration shared by every fit of the run.
    pub fn density_config(&self) -> DensityConfig {
        DensityConfig { bandwidth_rule: self.bandwidth_rule, ..DensityConfig::default() }
    }

    /// Check the whole configuration once, up front.
    pub fn validate(&self) -> Result<()> {
        if self.n_samples_per_image == 0 {
            return Err(Error::Validation("n_samples_per_image must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.ess_threshold) {
            return Err(Error::Validation(format!(
                "ess_threshold must be within [0, 1], got {}",
                self.ess_threshold
            )));
        }
        let full = self.full_params()?;
        let eff = self.effective_params()?;
        if !eff.is_subset_of(&full) {
            return Err(Error::Validation(format!(
                "effective parameters [{}] must be a subset of full parameters [{}]",
                eff.joined(),
                full.joined()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> JointAnalysisConfig {
        JointAnalysisConfig {
            full_parameter_set: vec!["x".into(), "y".into()],
            effective_parameter_set: vec!["y".into()],
            n_samples_per_image: 1000,
            bandwidth_rule: BandwidthRule::default(),
            random_seed: Some(1),
            ess_threshold: 0.01,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        base().validate().unwrap();
    }

    #[test]
    fn test_zero_samples_rejected() {
        let mut c = base();
        c.n_samples_per_image = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_effective_not_subset_rejected() {
        let mut c = base();
        c.effective_parameter_set = vec!["z".into()];
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_json_defaults() {
        let json = r#"{
            "full_parameter_set": ["x", "y"],
            "effective_parameter_set": ["y"],
            "n_samples_per_image": 500
        }"#;
        let c: JointAnalysisConfig = serde_json::from_str(json).unwrap();
        assert_eq!(c.bandwidth_rule, BandwidthRule::Silverman);
        assert_eq!(c.random_seed, None);
        assert!((c.ess_threshold - DEFAULT_ESS_THRESHOLD).abs() < 1e-15);
        c.validate().unwrap();
    }
}
