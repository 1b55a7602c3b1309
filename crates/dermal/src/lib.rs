//! # dermal
//!
//! Skin-condition image classification with visual explanation in Rust.
//!
//! dermal-rs takes raw image bytes through a convolutional classifier and,
//! optionally, produces a Grad-CAM saliency overlay showing which regions
//! drove the prediction:
//!
//! - **Model lifecycle**: lazy singleton handle, warm-up, eviction
//! - **Preprocessing**: candidate normalization chain with fallback
//! - **Classification**: EfficientNetV2-flavored classifier, ranked results
//! - **Explanation**: native activation capture and Grad-CAM heatmaps
//! - **Rendering**: jet-colorized overlay as a base64 PNG
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dermal::prelude::*;
//!
//! let pipeline = Pipeline::from_env();
//! let bytes = std::fs::read("lesion.jpg")?;
//!
//! let prediction = pipeline.predict(&bytes, &PredictOptions::default())?;
//! for result in &prediction.results {
//!     println!("{}: {:.1}%", result.class, result.probability);
//! }
//! if let Some(png) = prediction.heatmap_base64 {
//!     println!("overlay: {} base64 bytes", png.len());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use dermal_core as core;
pub use dermal_explain as explain;
pub use dermal_infer as infer;
pub use dermal_models as models;
pub use dermal_vision as vision;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use dermal::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use dermal_core::{
        class_label, ImageTensor, ImgShape, PipelineConfig, Precision, RuntimeConfig,
        CLASS_NAMES, N_CLASSES,
    };

    // Model lifecycle
    pub use dermal_models::{
        find_explainable_layer, ArtifactMetadata, AutodiffNdArray, LayerRef, LayerTree,
        LoadedModel, ModelStore, SkinNet, SkinNetConfig,
    };

    // Explanation
    pub use dermal_explain::{compute_saliency, Heatmap};

    // Imaging
    pub use dermal_vision::{decode_rgb, render_heatmap_png};

    // Pipeline
    pub use dermal_infer::{
        format_predictions, ClassResult, MemoryGovernor, Pipeline, PredictOptions, Prediction,
    };
}
