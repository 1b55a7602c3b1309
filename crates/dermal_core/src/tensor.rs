//! Image tensor types.

use burn::prelude::*;

use crate::error::{CoreError, Result};
use crate::shape::ImgShape;

/// A preprocessed image tensor with shape metadata.
///
/// Wraps a Burn tensor of shape `(1, C, H, W)` together with the
/// `(H, W, C)` metadata and the name of the preprocessing method that
/// produced it. Ephemeral: lives for one pipeline invocation and is owned
/// exclusively by it.
#[derive(Debug, Clone)]
pub struct ImageTensor<B: Backend> {
    inner: Tensor<B, 4>,
    shape: ImgShape,
    method: &'static str,
}

impl<B: Backend> ImageTensor<B> {
    /// Create a new ImageTensor from a batched channels-first Burn tensor.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch dimension is not 1.
    pub fn new(tensor: Tensor<B, 4>, method: &'static str) -> Result<Self> {
        let [batch, channels, height, width] = tensor.dims();
        if batch != 1 {
            return Err(CoreError::InvalidShape {
                expected: "batch size 1".to_string(),
                got: format!("batch size {batch}"),
            });
        }
        Ok(Self {
            inner: tensor,
            shape: ImgShape::new(height, width, channels),
            method,
        })
    }

    /// Create a zero-filled ImageTensor, used for the warm-up pass.
    pub fn zeros(shape: ImgShape, device: &B::Device) -> Self {
        Self {
            inner: Tensor::zeros(shape.batched_nchw(), device),
            shape,
            method: "zeros",
        }
    }

    /// Get the shape metadata.
    #[must_use]
    pub const fn shape(&self) -> ImgShape {
        self.shape
    }

    /// Name of the preprocessing method that produced this tensor.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        self.method
    }

    /// Size of the tensor payload in bytes (backend float width assumed 4).
    #[must_use]
    pub const fn byte_size(&self) -> usize {
        self.shape.numel() * 4
    }

    /// Get a reference to the underlying Burn tensor.
    #[must_use]
    pub const fn inner(&self) -> &Tensor<B, 4> {
        &self.inner
    }

    /// Consume self and return the underlying Burn tensor.
    #[must_use]
    pub fn into_inner(self) -> Tensor<B, 4> {
        self.inner
    }

    /// Get the device the tensor is on.
    pub fn device(&self) -> B::Device {
        self.inner.device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NdArray;

    #[test]
    fn test_zeros_shape() {
        let device = Default::default();
        let t: ImageTensor<NdArray> = ImageTensor::zeros(ImgShape::square(32), &device);
        assert_eq!(t.inner().dims(), [1, 3, 32, 32]);
        assert_eq!(t.method(), "zeros");
    }

    #[test]
    fn test_rejects_multi_batch() {
        let device = Default::default();
        let raw = Tensor::<NdArray, 4>::zeros([2, 3, 8, 8], &device);
        assert!(ImageTensor::new(raw, "div255").is_err());
    }

    #[test]
    fn test_metadata_from_tensor() {
        let device = Default::default();
        let raw = Tensor::<NdArray, 4>::zeros([1, 3, 16, 24], &device);
        let t = ImageTensor::new(raw, "efficientnet_v2").unwrap();
        assert_eq!(t.shape().height(), 16);
        assert_eq!(t.shape().width(), 24);
        assert_eq!(t.shape().channels(), 3);
        assert_eq!(t.method(), "efficientnet_v2");
    }
}
