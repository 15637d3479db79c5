//! Core traits for LensJoint
//!
//! The combination algorithm treats prior models as black-box collaborators:
//! it only ever asks for log-probabilities, optionally restricted to a subset
//! of parameters. Concrete analytic priors live in `lj-prob`; external
//! inference-result stores can supply their own implementations.

use crate::{ParameterSet, Result, SampleTable};

/// Prior probability model attached to one lensed image's inference run.
pub trait PriorModel: Send + Sync {
    /// The parameter set the prior is declared over.
    fn parameters(&self) -> &ParameterSet;

    /// Log prior probability for every row of `table`.
    ///
    /// With `restrict_to`, only the named subset of the prior's parameters
    /// contributes; the remaining dimensions are marginalized out. Every
    /// evaluated parameter must be a column of `table`. A row outside the
    /// prior's support yields `-inf` (a legitimate zero-probability value,
    /// not an error).
    fn log_prob(
        &self,
        table: &SampleTable,
        restrict_to: Option<&ParameterSet>,
    ) -> Result<Vec<f64>>;
}
