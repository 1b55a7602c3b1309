//! Saliency heatmap type and normalization.

use ndarray::Array2;

/// Below this maximum a saliency map is treated as effectively all-zero and
/// the absolute-value fallback normalization applies.
pub const NOISE_FLOOR: f32 = 1e-10;

/// A single-channel saliency map with values in `[0, 1]`.
///
/// Spatial resolution matches the target layer's feature map; upsampling to
/// image resolution happens in the synthesizer, not here.
#[derive(Debug, Clone)]
pub struct Heatmap {
    values: Array2<f32>,
}

impl Heatmap {
    /// Build a heatmap from a raw (signed) class-activation map.
    ///
    /// Negative influence is rectified away and the map is normalized by its
    /// maximum. When the rectified maximum sits below [`NOISE_FLOOR`] (the
    /// near-uniform or saturated activation case) the absolute raw values
    /// are normalized instead, so a degenerate all-zero map is only returned
    /// when the raw map itself is all zero.
    #[must_use]
    pub fn from_raw(raw: Array2<f32>) -> Self {
        let rectified = raw.mapv(|v| v.max(0.0));
        let max = rectified.iter().cloned().fold(0.0f32, f32::max);

        let values = if max > NOISE_FLOOR {
            rectified.mapv(|v| v / max)
        } else {
            let abs = raw.mapv(f32::abs);
            let abs_max = abs.iter().cloned().fold(0.0f32, f32::max);
            if abs_max > NOISE_FLOOR {
                abs.mapv(|v| v / abs_max)
            } else {
                abs
            }
        };

        Self { values }
    }

    /// Wrap already-normalized values. Callers guarantee the `[0, 1]` range.
    #[must_use]
    pub fn from_normalized(values: Array2<f32>) -> Self {
        Self { values }
    }

    /// The normalized saliency values.
    #[must_use]
    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    /// Spatial resolution `(h, w)`.
    #[must_use]
    pub fn dims(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Maximum saliency value.
    #[must_use]
    pub fn max(&self) -> f32 {
        self.values.iter().cloned().fold(0.0f32, f32::max)
    }

    /// Minimum saliency value.
    #[must_use]
    pub fn min(&self) -> f32 {
        self.values.iter().cloned().fold(f32::INFINITY, f32::min)
    }
}
