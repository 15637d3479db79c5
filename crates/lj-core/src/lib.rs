//! # lj-core
//!
//! Core types for LensJoint: the error taxonomy, ordered parameter sets,
//! columnar sample tables, the prior-model trait, and the small amount of
//! lensing phenomenology shared across the workspace.
//!
//! The combination algorithm itself lives in `lj-inference`; this crate holds
//! only what every layer agrees on.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Derived mass coordinates added ahead of prior evaluation.
pub mod derived;
/// Error types.
pub mod error;
/// Apparent parameters of individual lensed images.
pub mod lensing;
/// Ordered, named parameter sets.
pub mod params;
/// Columnar sample storage.
pub mod table;
/// Core traits (prior models).
pub mod traits;

pub use derived::with_derived_mass_parameters;
pub use error::{Error, Result};
pub use lensing::{ImageLensing, ImageType};
pub use params::ParameterSet;
pub use table::SampleTable;
pub use traits::PriorModel;
