//! Runtime and pipeline configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::precision::Precision;
use crate::shape::DEFAULT_IMG_SIZE;

/// Default number of ranked results returned per prediction.
pub const DEFAULT_TOP_K: usize = 7;

/// Resampling filter for image resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    /// Lanczos windowed sinc, quality-preserving (input resize default).
    Lanczos3,
    /// Bilinear interpolation, smooth (heatmap upsampling default).
    Bilinear,
    /// Catmull-Rom cubic interpolation.
    CatmullRom,
    /// Nearest neighbour.
    Nearest,
}

/// Process-level configuration read from the environment.
///
/// All values affect behavior but not the pipeline's contract.
///
/// | Variable | Default | Meaning |
/// |---|---|---|
/// | `DERMAL_MODEL_PATH` | `dermatology_stage1.mpk` | Model artifact path |
/// | `DERMAL_ENABLE_GRADCAM` | `true` | Default explanation toggle |
/// | `DERMAL_PRELOAD` | `false` | Eager model load at startup |
/// | `DERMAL_PRECISION` | `full` | Weight precision (`full`\|`half`) |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Path to the serialized model artifact.
    pub model_path: PathBuf,
    /// Whether explanations are generated when a request doesn't say.
    pub enable_gradcam: bool,
    /// Load and warm the model eagerly at startup rather than on first use.
    pub preload: bool,
    /// Weight precision used when loading the artifact.
    pub precision: Precision,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("dermatology_stage1.mpk"),
            enable_gradcam: true,
            preload: false,
            precision: Precision::Full,
        }
    }
}

impl RuntimeConfig {
    /// Read configuration from the environment, falling back to defaults
    /// for unset or unparseable values.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_path: std::env::var_os("DERMAL_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            enable_gradcam: env_bool("DERMAL_ENABLE_GRADCAM").unwrap_or(defaults.enable_gradcam),
            preload: env_bool("DERMAL_PRELOAD").unwrap_or(defaults.preload),
            precision: std::env::var("DERMAL_PRECISION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.precision),
        }
    }

    /// Set the model path.
    #[must_use]
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    /// Set the explanation default.
    #[must_use]
    pub fn with_gradcam(mut self, enabled: bool) -> Self {
        self.enable_gradcam = enabled;
        self
    }
}

fn env_bool(key: &str) -> Option<bool> {
    let raw = std::env::var(key).ok()?;
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Parameters for one pipeline instance.
///
/// The single source of truth for the knobs the near-duplicate pipeline
/// variants used to disagree on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Square input edge length the model expects.
    pub image_size: usize,
    /// Weight precision.
    pub precision: Precision,
    /// Filter for resizing the input image to the model size.
    pub resize_filter: ResizeFilter,
    /// Whether saliency explanations are produced by default.
    pub explanation_enabled: bool,
    /// Default number of ranked results.
    pub top_k: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            image_size: DEFAULT_IMG_SIZE,
            precision: Precision::Full,
            resize_filter: ResizeFilter::Lanczos3,
            explanation_enabled: true,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl PipelineConfig {
    /// Derive a pipeline config from the process-level configuration.
    #[must_use]
    pub fn from_runtime(runtime: &RuntimeConfig) -> Self {
        Self {
            precision: runtime.precision,
            explanation_enabled: runtime.enable_gradcam,
            ..Default::default()
        }
    }

    /// Set the input edge length.
    #[must_use]
    pub fn with_image_size(mut self, image_size: usize) -> Self {
        self.image_size = image_size;
        self
    }

    /// Set the explanation default.
    #[must_use]
    pub fn with_explanation(mut self, enabled: bool) -> Self {
        self.explanation_enabled = enabled;
        self
    }

    /// Set the default top-k.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}
