//! # lj-inference
//!
//! Joint multi-image posterior combination for LensJoint.
//!
//! Given per-image posterior samples of a gravitationally lensed source,
//! this crate tests the shared-source hypothesis by combining the images:
//! per-image kernel density models in quantile-normalized space, composite
//! samples mixing one anchor image's full draw with the other images'
//! effective parameters, importance weights correcting the factorized
//! proposal toward the joint posterior, and a pooled, reweighted joint
//! density estimate.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// One-call pipeline wiring.
pub mod analysis;
/// Per-image records and the construct-once collection.
pub mod collection;
/// Run configuration.
pub mod config;
/// Transformed kernel density models.
pub mod density;
/// Pooling, weight normalization and the joint refit.
pub mod joint;
/// Composite samples and the effective-parameter remapper.
pub mod remap;
/// Importance-weight computation.
pub mod weights;

pub use analysis::run_joint_analysis;
pub use collection::{ImageRecord, PosteriorCollection};
pub use config::JointAnalysisConfig;
pub use density::{BandwidthRule, DensityConfig, DensityModel};
pub use joint::{
    effective_sample_size, normalized_weights, JointEstimate, JointEstimateBuilder,
    WeightDiagnostics,
};
pub use remap::{effective_column_name, CompositeSample, EffectiveParameterRemapper};
pub use weights::{ImportanceWeightEngine, WeightedComposite};
