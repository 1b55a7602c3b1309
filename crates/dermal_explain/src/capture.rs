//! Captured layer activations.

use burn::prelude::*;

use crate::error::{ExplainError, Result};

/// The target layer's output from one forward pass.
///
/// Obtained through the model's capture side channel, not a normal return
/// value. Lives only inside one saliency computation and is dropped with it
/// regardless of outcome.
#[derive(Debug, Clone)]
pub struct ActivationCapture<B: Backend> {
    layer: String,
    activation: Tensor<B, 4>,
}

impl<B: Backend> ActivationCapture<B> {
    /// Build a capture from the forward pass's side channel.
    ///
    /// # Errors
    ///
    /// An empty slot means the target layer was not on the executed path
    /// (conditional branch or name mismatch): [`ExplainError::CaptureFailed`].
    pub fn from_slot(layer: &str, slot: Option<Tensor<B, 4>>) -> Result<Self> {
        match slot {
            Some(activation) => Ok(Self {
                layer: layer.to_string(),
                activation,
            }),
            None => Err(ExplainError::CaptureFailed(layer.to_string())),
        }
    }

    /// Name of the captured layer.
    #[must_use]
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// The captured activation tensor of shape `(1, C, h, w)`.
    #[must_use]
    pub const fn activation(&self) -> &Tensor<B, 4> {
        &self.activation
    }

    /// Spatial resolution `(h, w)` of the captured feature map.
    #[must_use]
    pub fn spatial_dims(&self) -> (usize, usize) {
        let [_, _, h, w] = self.activation.dims();
        (h, w)
    }
}
