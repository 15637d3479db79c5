//! Error types for LensJoint

use thiserror::Error;

/// LensJoint error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Sample columns do not match the expected parameter set.
    #[error("dimension mismatch: expected parameters [{expected}], got [{got}]")]
    DimensionMismatch {
        /// Comma-joined names of the expected parameter set.
        expected: String,
        /// Comma-joined names actually present.
        got: String,
    },

    /// Operation requires a fitted density model.
    #[error("density model over [{0}] is not fitted; call fit() first")]
    NotFitted(String),

    /// Sample batches have misaligned row counts.
    #[error("row count mismatch in {context}: expected {expected} rows, got {got}")]
    RowCountMismatch {
        /// Expected number of rows.
        expected: usize,
        /// Number of rows actually seen.
        got: usize,
        /// Which batch was misaligned.
        context: String,
    },

    /// Image index outside `0..n_images`.
    #[error("image index {index} out of range for {n_images} images")]
    IndexOutOfRange {
        /// Offending index.
        index: usize,
        /// Number of images in the collection.
        n_images: usize,
    },

    /// Density evaluation undefined for the given input.
    #[error("score evaluation failed: {0}")]
    ScoreEvaluation(String),

    /// Construction-time contract violation.
    #[error("validation error: {0}")]
    Validation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
