//! One-call joint analysis pipeline.

use crate::collection::PosteriorCollection;
use crate::config::JointAnalysisConfig;
use crate::joint::{JointEstimate, JointEstimateBuilder};
use crate::weights::ImportanceWeightEngine;
use lj_core::{PriorModel, Result, SampleTable};
use std::sync::Arc;

/// Run the full pipeline: fit per-image density models, compute weighted
/// composites for every anchor, pool and refit the joint density.
///
/// `posteriors[i]` and `priors[i]` describe lensed image `i`. The returned
/// estimate owns all pooled artifacts; no reference to the intermediate
/// collection is retained.
pub fn run_joint_analysis(
    posteriors: Vec<SampleTable>,
    priors: Vec<Arc<dyn PriorModel>>,
    config: &JointAnalysisConfig,
) -> Result<JointEstimate> {
    config.validate()?;
    let full = config.full_params()?;
    let eff = config.effective_params()?;

    let collection = PosteriorCollection::from_posteriors(
        posteriors,
        priors,
        full.clone(),
        eff,
        config.density_config(),
    )?;

    let engine = ImportanceWeightEngine::new(config.n_samples_per_image, config.random_seed)?;
    let parts = engine.run(&collection)?;

    JointEstimateBuilder::new(config.density_config())
        .with_ess_threshold(config.ess_threshold)?
        .build(&parts, &full)
}
