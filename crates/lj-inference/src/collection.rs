//! Per-image posterior records and their fitted density models.
//!
//! A [`PosteriorCollection`] is the construct-once cache of a joint analysis:
//! every image's density models are fitted when the collection is built and
//! then shared immutably by all downstream consumers. Refitting with a new
//! density configuration is the one explicit invalidation point.

use crate::density::{DensityConfig, DensityModel};
use lj_core::{Error, ParameterSet, PriorModel, Result, SampleTable};
use std::sync::Arc;

/// One lensed image's bundle: posterior draws, fitted density models over the
/// full and effective parameter sets, and the image's analysis prior.
pub struct ImageRecord {
    /// Posterior sample table (at least the full parameter set).
    pub posterior: SampleTable,
    /// Density model over the full parameter set.
    pub full_density: DensityModel,
    /// Density model over the effective parameter set.
    pub effective_density: DensityModel,
    /// The image's analysis prior.
    pub prior: Arc<dyn PriorModel>,
}

impl std::fmt::Debug for ImageRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRecord")
            .field("posterior", &self.posterior)
            .field("full_density", &self.full_density)
            .field("effective_density", &self.effective_density)
            .field("prior", &self.prior.parameters())
            .finish()
    }
}

/// Immutable store of all images entering one joint analysis.
#[derive(Debug)]
pub struct PosteriorCollection {
    images: Vec<ImageRecord>,
    full_params: ParameterSet,
    effective_params: ParameterSet,
}

impl PosteriorCollection {
    /// Build the collection and fit both density models for every image.
    ///
    /// `effective_params` must be a subset of `full_params`; every posterior
    /// must provide the full parameter columns. Posterior row weights, if
    /// present, are passed through to the density fits.
    pub fn from_posteriors(
        posteriors: Vec<SampleTable>,
        priors: Vec<Arc<dyn PriorModel>>,
        full_params: ParameterSet,
        effective_params: ParameterSet,
        density_config: DensityConfig,
    ) -> Result<Self> {
        if posteriors.len() < 2 {
            return Err(Error::Validation(format!(
                "joint analysis needs at least 2 images, got {}",
                posteriors.len()
            )));
        }
        if priors.len() != posteriors.len() {
            return Err(Error::Validation(format!(
                "got {} posteriors but {} priors",
                posteriors.len(),
                priors.len()
            )));
        }
        if !effective_params.is_subset_of(&full_params) {
            return Err(Error::Validation(format!(
                "effective parameters [{}] must be a subset of full parameters [{}]",
                effective_params.joined(),
                full_params.joined()
            )));
        }

        let mut images = Vec::with_capacity(posteriors.len());
        for (posterior, prior) in posteriors.into_iter().zip(priors) {
            let (full_density, effective_density) = fit_pair(
                &posterior,
                &full_params,
                &effective_params,
                density_config,
            )?;
            images.push(ImageRecord { posterior, full_density, effective_density, prior });
        }

        Ok(Self { images, full_params, effective_params })
    }

    /// Number of images.
    pub fn n_images(&self) -> usize {
        self.images.len()
    }

    /// The full parameter set.
    pub fn full_params(&self) -> &ParameterSet {
        &self.full_params
    }

    /// The effective parameter set.
    pub fn effective_params(&self) -> &ParameterSet {
        &self.effective_params
    }

    /// Image record by index.
    pub fn image(&self, i: usize) -> Result<&ImageRecord> {
        self.images.get(i).ok_or(Error::IndexOutOfRange { index: i, n_images: self.images.len() })
    }

    /// Split into image `i` and all other images, the latter keyed by their
    /// indices in ascending order skipping `i`. Pure read of stored state.
    pub fn partition(&self, i: usize) -> Result<(&ImageRecord, Vec<(usize, &ImageRecord)>)> {
        let anchor = self.image(i)?;
        let others = self
            .images
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .collect();
        Ok((anchor, others))
    }

    /// Refit every image's density models with a new configuration.
    ///
    /// This is the explicit invalidation point for the cached fits; all
    /// references handed out by [`Self::partition`] must be dropped first
    /// (enforced by the borrow checker).
    pub fn refit_densities(&mut self, density_config: DensityConfig) -> Result<()> {
        for record in &mut self.images {
            let (full_density, effective_density) = fit_pair(
                &record.posterior,
                &self.full_params,
                &self.effective_params,
                density_config,
            )?;
            record.full_density = full_density;
            record.effective_density = effective_density;
        }
        Ok(())
    }
}

fn fit_pair(
    posterior: &SampleTable,
    full_params: &ParameterSet,
    effective_params: &ParameterSet,
    density_config: DensityConfig,
) -> Result<(DensityModel, DensityModel)> {
    let full_table = posterior.select(full_params)?;
    let eff_table = posterior.select(effective_params)?;

    let mut full_density = DensityModel::with_config(full_params.clone(), density_config);
    full_density.fit(&full_table, posterior.weights())?;

    let mut effective_density = DensityModel::with_config(effective_params.clone(), density_config);
    effective_density.fit(&eff_table, posterior.weights())?;

    Ok((full_density, effective_density))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lj_prob::IndependentPriorSet;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal as RandNormal};

    fn collection(n_images: usize) -> PosteriorCollection {
        let full = ParameterSet::new(["x", "y"]).unwrap();
        let eff = ParameterSet::new(["y"]).unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(31);
        let normal = RandNormal::new(0.0, 1.0).unwrap();

        let mut posteriors = Vec::new();
        let mut priors: Vec<Arc<dyn PriorModel>> = Vec::new();
        for _ in 0..n_images {
            let rows: Vec<Vec<f64>> =
                (0..150).map(|_| vec![normal.sample(&mut rng), normal.sample(&mut rng)]).collect();
            posteriors.push(SampleTable::from_rows(full.clone(), &rows).unwrap());
            priors.push(Arc::new(IndependentPriorSet::uniform_box(&full, -10.0, 10.0).unwrap()));
        }
        PosteriorCollection::from_posteriors(posteriors, priors, full, eff, DensityConfig::default())
            .unwrap()
    }

    #[test]
    fn test_partition_orders_others_ascending() {
        let c = collection(4);
        let (_, others) = c.partition(2).unwrap();
        let indices: Vec<usize> = others.iter().map(|(j, _)| *j).collect();
        assert_eq!(indices, vec![0, 1, 3]);
    }

    #[test]
    fn test_partition_out_of_range() {
        let c = collection(3);
        let err = c.partition(3).unwrap_err();
        assert!(
            matches!(err, Error::IndexOutOfRange { index: 3, n_images: 3 }),
            "got {err:?}"
        );
    }

    #[test]
    fn test_densities_fitted_on_construction() {
        let c = collection(2);
        let rec = c.image(0).unwrap();
        assert!(rec.full_density.is_fitted());
        assert!(rec.effective_density.is_fitted());
        assert_eq!(rec.effective_density.params().names(), ["y".to_string()]);
    }

    #[test]
    fn test_single_image_rejected() {
        let full = ParameterSet::new(["x"]).unwrap();
        let t = SampleTable::from_rows(full.clone(), &[vec![0.0], vec![1.0]]).unwrap();
        let prior: Arc<dyn PriorModel> =
            Arc::new(IndependentPriorSet::uniform_box(&full, -1.0, 2.0).unwrap());
        let err = PosteriorCollection::from_posteriors(
            vec![t],
            vec![prior],
            full.clone(),
            full,
            DensityConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got {err:?}");
    }

    #[test]
    fn test_effective_must_be_subset() {
        let full = ParameterSet::new(["x"]).unwrap();
        let eff = ParameterSet::new(["z"]).unwrap();
        let t = SampleTable::from_rows(full.clone(), &[vec![0.0], vec![1.0]]).unwrap();
        let prior: Arc<dyn PriorModel> =
            Arc::new(IndependentPriorSet::uniform_box(&full, -1.0, 2.0).unwrap());
        let err = PosteriorCollection::from_posteriors(
            vec![t.clone(), t],
            vec![prior.clone(), prior],
            full,
            eff,
            DensityConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got {err:?}");
    }

    #[test]
    fn test_refit_densities_replaces_fits() {
        let mut c = collection(2);
        // Compare the 1-D effective fit: Silverman and Scott coincide at d=2
        // but differ by (4/3)^(1/5) at d=1.
        let h_before = c.image(0).unwrap().effective_density.bandwidths().unwrap().to_vec();
        c.refit_densities(DensityConfig {
            bandwidth_rule: crate::density::BandwidthRule::Scott,
            ..DensityConfig::default()
        })
        .unwrap();
        let h_after = c.image(0).unwrap().effective_density.bandwidths().unwrap().to_vec();
        assert_ne!(h_before, h_after, "refit with a different rule must change bandwidths");
    }
}
