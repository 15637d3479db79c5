//! # lj-prob
//!
//! Shared probability layer for LensJoint:
//! - numerically-stable math helpers,
//! - the marginal quantile-to-normal transform backing the density models,
//! - analytic one-dimensional priors and independent products of them.
//!
//! Everything here is deterministic given its inputs; sampling lives in
//! `lj-inference` where random sources are threaded explicitly.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Stable math utilities (logsumexp, normal log-pdf, weighted moments).
pub mod math;
/// Analytic priors and independent prior sets.
pub mod priors;
/// Marginal quantile-to-normal transforms.
pub mod transform;

pub use priors::{IndependentPriorSet, Prior};
pub use transform::{QuantileNormalTransform, DEFAULT_MAX_KNOTS};
