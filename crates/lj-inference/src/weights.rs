//! Importance weights for composite multi-image samples.
//!
//! For each anchor image the engine draws full-parameter proposals from the
//! anchor's density model and effective-parameter proposals from every other
//! image, assembles composite rows, and attaches a log importance weight
//! correcting the factorized per-image proposal toward the joint posterior
//! under the shared-source hypothesis.
//!
//! The log-weight keeps the four-term structure
//!
//! ```text
//! log w = (log_pos_self + log_pos_others)            // joint proposal evaluation
//!       - (log_prior_self + log_prior_others_full)   // per-image prior normalization
//!       + (log_prior_self + log_prior_others_eff)    // target prior numerator
//!       - (log_pos_self + log_pos_others_eff)        // proposal recomputed from the rows
//! ```
//!
//! rather than collapsing to a posterior/prior ratio: the prior terms are
//! evaluated at different points (full composite vectors vs substituted
//! effective blocks), which is exactly where the cross-image consistency
//! correction lives.

use crate::collection::PosteriorCollection;
use crate::remap::{CompositeSample, EffectiveParameterRemapper};
use lj_core::{with_derived_mass_parameters, Error, Result};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rayon::prelude::*;

/// Composite rows for one anchor image with their log importance weights.
pub struct WeightedComposite {
    /// The composite sample batch.
    pub composite: CompositeSample,
    /// One log-weight per composite row.
    pub log_weights: Vec<f64>,
}

/// Per-anchor-image proposal sampling and weight computation.
pub struct ImportanceWeightEngine {
    n_samples_per_image: usize,
    seed: Option<u64>,
}

impl ImportanceWeightEngine {
    /// Create an engine drawing `n_samples_per_image` proposals per anchor.
    ///
    /// With a seed, anchor `i` uses `seed + i`, so runs are reproducible even
    /// when anchors execute in parallel.
    pub fn new(n_samples_per_image: usize, seed: Option<u64>) -> Result<Self> {
        if n_samples_per_image == 0 {
            return Err(Error::Validation("n_samples_per_image must be > 0".into()));
        }
        Ok(Self { n_samples_per_image, seed })
    }

    /// Compute weighted composites for every anchor image.
    ///
    /// Anchors are independent reads of the collection, so they run in
    /// parallel, each with its own random source.
    pub fn run(&self, collection: &PosteriorCollection) -> Result<Vec<WeightedComposite>> {
        (0..collection.n_images())
            .into_par_iter()
            .map(|i| {
                let mut rng = match self.seed {
                    Some(s) => StdRng::seed_from_u64(s.wrapping_add(i as u64)),
                    None => StdRng::from_entropy(),
                };
                self.run_for_anchor(collection, i, &mut rng)
            })
            .collect()
    }

    /// Compute the weighted composite for a single anchor image.
    pub fn run_for_anchor(
        &self,
        collection: &PosteriorCollection,
        anchor_index: usize,
        rng: &mut dyn RngCore,
    ) -> Result<WeightedComposite> {
        let (anchor, others) = collection.partition(anchor_index)?;
        let n = self.n_samples_per_image;
        let n_images = collection.n_images();

        // Proposal draws: anchor over the full set, every other image over
        // the effective set.
        let anchor_samples = anchor.full_density.sample(n, rng)?;
        let mut other_batches = Vec::with_capacity(others.len());
        for (_, record) in &others {
            other_batches.push(record.effective_density.sample(n, rng)?);
        }

        let remapper = EffectiveParameterRemapper::new(
            collection.full_params().clone(),
            collection.effective_params().clone(),
        )?;
        let composite = remapper.remap(&anchor_samples, &other_batches, anchor_index, n_images)?;

        // Proposal evaluation as drawn.
        let log_pos_self = anchor.full_density.score(&anchor_samples)?;
        let mut log_pos_others = vec![0.0f64; n];
        for ((_, record), batch) in others.iter().zip(&other_batches) {
            accumulate(&mut log_pos_others, &record.effective_density.score(batch)?);
        }

        // Proposal recomputed from the composite rows, restricted to each
        // image's effective block.
        let mut log_pos_others_eff = vec![0.0f64; n];
        for (j, record) in &others {
            let block = composite.effective_block(*j)?;
            accumulate(&mut log_pos_others_eff, &record.effective_density.score(&block)?);
        }

        // Anchor prior over the full row, with derived coordinates added
        // ahead of evaluation.
        let anchor_full = with_derived_mass_parameters(&composite.full_block_for(anchor_index)?)?;
        let log_prior_self = anchor.prior.log_prob(&anchor_full, None)?;

        // Other-image priors at each image's full composite vector...
        let mut log_prior_others_full = vec![0.0f64; n];
        for (j, record) in &others {
            let full_j = with_derived_mass_parameters(&composite.full_block_for(*j)?)?;
            accumulate(&mut log_prior_others_full, &record.prior.log_prob(&full_j, None)?);
        }

        // ...and restricted to the effective parameters alone.
        let mut log_prior_others_eff = vec![0.0f64; n];
        let eff_params = collection.effective_params();
        for (j, record) in &others {
            let block = composite.effective_block(*j)?;
            accumulate(
                &mut log_prior_others_eff,
                &record.prior.log_prob(&block, Some(eff_params))?,
            );
        }

        let mut log_weights = Vec::with_capacity(n);
        for r in 0..n {
            let proposal = log_pos_self[r] + log_pos_others[r];
            let prior_full = log_prior_self[r] + log_prior_others_full[r];
            let target = log_prior_self[r] + log_prior_others_eff[r];
            let proposal_eff = log_pos_self[r] + log_pos_others_eff[r];

            // Target side first: a log-zero numerator is a legitimate zero
            // weight. A prior vanishing only in the denominator would make
            // the weight diverge, which is a defect of the inputs, not a low
            // probability sample.
            let numerator = proposal + target;
            let denominator = prior_full + proposal_eff;
            let log_w = if numerator == f64::NEG_INFINITY {
                f64::NEG_INFINITY
            } else if denominator == f64::NEG_INFINITY {
                return Err(Error::ScoreEvaluation(format!(
                    "prior vanishes at proposal draw {r} of anchor {anchor_index}; \
                     importance weight diverges"
                )));
            } else {
                numerator - denominator
            };
            log_weights.push(log_w);
        }

        Ok(WeightedComposite { composite, log_weights })
    }
}

#[inline]
fn accumulate(acc: &mut [f64], terms: &[f64]) {
    debug_assert_eq!(acc.len(), terms.len());
    for (a, &t) in acc.iter_mut().zip(terms) {
        *a += t;
    }
}
