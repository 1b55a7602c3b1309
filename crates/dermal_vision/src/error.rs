//! Error types for dermal_vision.

use thiserror::Error;

/// Result type alias using [`VisionError`].
pub type Result<T> = std::result::Result<T, VisionError>;

/// Errors from the imaging paths.
#[derive(Error, Debug)]
pub enum VisionError {
    /// The input bytes are not a decodable image.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// A preprocessing candidate could not be built. Skipped, never fatal.
    #[error("Candidate '{method}' failed: {reason}")]
    Candidate {
        /// Name of the preprocessing method.
        method: &'static str,
        /// What went wrong.
        reason: String,
    },

    /// Heatmap geometry does not form a valid image.
    #[error("Invalid heatmap geometry: {0}")]
    Heatmap(String),

    /// PNG or base64 encoding failed. Degrades to "no heatmap".
    #[error("Failed to encode overlay: {0}")]
    Encode(String),
}
