//! Error types for dermal_infer.

use thiserror::Error;

use dermal_models::ModelError;

/// Result type alias using [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Request-fatal pipeline errors.
///
/// Explanation-path failures never appear here; they degrade to a missing
/// heatmap on an otherwise successful prediction.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The request body is not a decodable image. Raised before the model
    /// handle is touched.
    #[error("Failed to decode input image: {0}")]
    Decode(String),

    /// The model could not be loaded. Fatal to serving capability.
    #[error("Model load failed: {0}")]
    ModelLoad(#[from] ModelError),

    /// Every preprocessing candidate was rejected by the model.
    #[error("All preprocessing candidates were rejected by the model")]
    ExhaustedCandidates,
}
