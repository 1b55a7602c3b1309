//! Error types for dermal_models.

use thiserror::Error;

/// Result type alias using [`ModelError`].
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors from model loading and inference.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The model artifact could not be loaded. Fatal to serving capability.
    #[error("Failed to load model: {0}")]
    Load(String),

    /// Error saving a checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Input tensor does not match the model's declared input shape.
    #[error("Input shape mismatch: model expects {expected}, got {got}")]
    ShapeMismatch {
        /// Shape the model was built for.
        expected: String,
        /// Shape that was provided.
        got: String,
    },

    /// A named layer was not found in the model graph.
    #[error("Layer '{0}' not found in model")]
    LayerNotFound(String),

    /// Failure reading tensor data back from the backend.
    #[error("Tensor readback failed: {0}")]
    Readback(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
