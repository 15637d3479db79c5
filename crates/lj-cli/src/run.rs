//! The `lj joint` command: posterior tables in, pooled joint estimate out.

use crate::tablefile;
use anyhow::{bail, Context, Result};
use lj_core::{ImageLensing, ImageType, PriorModel};
use lj_inference::{run_joint_analysis, JointAnalysisConfig};
use lj_prob::{IndependentPriorSet, Prior};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// On-disk run configuration: analysis options plus the file and prior
/// boundary the core leaves to its callers.
#[derive(Debug, Deserialize)]
pub struct RunConfig {
    /// One posterior table per lensed image, in image-index order.
    pub posterior_files: Vec<PathBuf>,
    /// Marginal prior per parameter, shared by all images.
    pub prior: BTreeMap<String, Prior>,
    /// Core analysis options.
    #[serde(flatten)]
    pub analysis: JointAnalysisConfig,
}

/// Machine-readable summary printed to stdout after a run.
#[derive(Debug, Serialize)]
struct RunSummary {
    n_images: usize,
    n_pooled: usize,
    effective_sample_size: f64,
    ess_fraction: f64,
    degenerate: bool,
}

/// Execute a joint-analysis run.
pub fn joint(config_path: &Path, out_dir: &Path, joint_draws: usize) -> Result<()> {
    let text = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let config: RunConfig = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;

    let prior_set = IndependentPriorSet::new(config.prior.iter().map(|(n, p)| (n.clone(), p.clone())))
        .context("invalid prior configuration")?;
    let prior: Arc<dyn PriorModel> = Arc::new(prior_set);

    let mut posteriors = Vec::with_capacity(config.posterior_files.len());
    for file in &config.posterior_files {
        tracing::info!(file = %file.display(), "reading posterior table");
        let table = tablefile::read_table(file)
            .with_context(|| format!("failed to read posterior table {}", file.display()))?;
        tracing::debug!(rows = table.n_rows(), "posterior table loaded");
        posteriors.push(table);
    }
    let n_images = posteriors.len();
    let priors: Vec<Arc<dyn PriorModel>> = (0..n_images).map(|_| Arc::clone(&prior)).collect();

    tracing::info!(n_images, n_samples_per_image = config.analysis.n_samples_per_image, "running joint analysis");
    let estimate = run_joint_analysis(posteriors, priors, &config.analysis)?;

    if estimate.diagnostics.degenerate {
        tracing::warn!(
            ess = estimate.diagnostics.effective_sample_size,
            ess_fraction = estimate.diagnostics.ess_fraction,
            threshold = estimate.diagnostics.threshold_fraction,
            "importance weights are degenerate; the joint estimate rests on few samples"
        );
    }

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    tablefile::write_table(&out_dir.join("pooled_samples.txt"), &estimate.pooled_samples)?;
    tablefile::write_column(
        &out_dir.join("log_weights.txt"),
        "log_weight",
        &estimate.pooled_log_weights,
    )?;

    if joint_draws > 0 {
        // Engine anchors consumed seed..seed+n_images-1; continue past them.
        let mut rng = match config.analysis.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(n_images as u64)),
            None => StdRng::from_entropy(),
        };
        let draws = estimate.density.sample(joint_draws, &mut rng)?;
        tablefile::write_table(&out_dir.join("joint_samples.txt"), &draws)?;
    }

    let summary = RunSummary {
        n_images,
        n_pooled: estimate.pooled_samples.n_rows(),
        effective_sample_size: estimate.diagnostics.effective_sample_size,
        ess_fraction: estimate.diagnostics.ess_fraction,
        degenerate: estimate.diagnostics.degenerate,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Compute one lensed image's apparent parameters and print them as JSON.
pub fn effective(
    magnification: f64,
    time_delay: f64,
    image_type: u8,
    luminosity_distance: f64,
    geocent_time: f64,
    phase: f64,
) -> Result<()> {
    let image_type = match image_type {
        1 => ImageType::TypeI,
        2 => ImageType::TypeII,
        3 => ImageType::TypeIII,
        other => bail!("image type must be 1, 2 or 3, got {other}"),
    };
    let lensing = ImageLensing { magnification, time_delay, image_type };

    let out = serde_json::json!({
        "effective_luminosity_distance": lensing.effective_luminosity_distance(luminosity_distance)?,
        "effective_geocent_time": lensing.effective_geocent_time(geocent_time),
        "effective_phase": lensing.effective_phase(phase),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
