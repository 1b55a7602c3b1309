//! Error types for dermal_explain.

use thiserror::Error;

/// Result type alias using [`ExplainError`].
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors from the explanation path.
///
/// All of these degrade to "no heatmap" at the pipeline level; none of them
/// fail a classification request.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// No explainable layer could be located or resolved.
    #[error("No suitable layer for explanation: {0}")]
    LayerNotFound(String),

    /// The target layer's output was never captured; the layer is not on
    /// the executed forward path.
    #[error("Failed to capture activations of layer '{0}'")]
    CaptureFailed(String),

    /// No gradient path from the class score to the captured activations.
    #[error("No gradient from class score to layer '{0}'")]
    NoGradient(String),

    /// Failure reading tensor data back from the backend.
    #[error("Tensor readback failed: {0}")]
    Readback(String),
}
