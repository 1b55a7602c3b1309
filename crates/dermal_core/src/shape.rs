//! Model input shape metadata.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Fallback input edge length when the artifact declares no shape.
pub const DEFAULT_IMG_SIZE: usize = 300;

/// Shape metadata for model input images.
///
/// Follows the convention `(H, W, C)`:
/// - `H`: Height in pixels
/// - `W`: Width in pixels
/// - `C`: Color channels (3 for RGB)
///
/// # Example
///
/// ```rust
/// use dermal_core::ImgShape;
///
/// let shape = ImgShape::new(300, 300, 3);
/// assert_eq!(shape.height(), 300);
/// assert_eq!(shape.channels(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImgShape {
    height: usize,
    width: usize,
    channels: usize,
}

impl ImgShape {
    /// Create a new ImgShape with the specified dimensions.
    #[must_use]
    pub const fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// Square RGB shape with the given edge length.
    #[must_use]
    pub const fn square(edge: usize) -> Self {
        Self::new(edge, edge, 3)
    }

    /// The hardcoded fallback shape used when artifact introspection fails.
    #[must_use]
    pub const fn fallback() -> Self {
        Self::square(DEFAULT_IMG_SIZE)
    }

    /// Create an ImgShape from a slice of dimensions `[H, W, C]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice doesn't contain exactly 3 elements.
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        if dims.len() != 3 {
            return Err(CoreError::DimensionError {
                expected: 3,
                got: dims.len(),
            });
        }
        Ok(Self::new(dims[0], dims[1], dims[2]))
    }

    /// Get the height in pixels.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Get the width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Get the number of channels.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Total number of elements for a single image.
    #[must_use]
    pub const fn numel(&self) -> usize {
        self.height * self.width * self.channels
    }

    /// Check if this is an empty shape (any dimension is zero).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0 || self.channels == 0
    }

    /// Convert to an `[H, W, C]` array.
    #[must_use]
    pub const fn as_array(&self) -> [usize; 3] {
        [self.height, self.width, self.channels]
    }

    /// Batched channels-first dims `[1, C, H, W]` as consumed by the model.
    #[must_use]
    pub const fn batched_nchw(&self) -> [usize; 4] {
        [1, self.channels, self.height, self.width]
    }
}

impl std::fmt::Display for ImgShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(H={}, W={}, C={})", self.height, self.width, self.channels)
    }
}

impl From<(usize, usize, usize)> for ImgShape {
    fn from((height, width, channels): (usize, usize, usize)) -> Self {
        Self::new(height, width, channels)
    }
}
