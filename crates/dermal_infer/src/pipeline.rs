//! The classification pipeline.
//!
//! One parameterized path from raw request bytes to ranked results and an
//! optional heatmap. Ordering is fixed: decode, acquire the model, try
//! preprocessing candidates in priority order, format the first accepted
//! forward pass, then optionally explain. Decode failures surface before the
//! model handle is touched, and the memory governor sweeps after every run
//! regardless of outcome.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use dermal_core::{ImageTensor, PipelineConfig, RuntimeConfig};
use dermal_explain::compute_saliency_guarded;
use dermal_models::{find_explainable_layer, AutodiffNdArray, LoadedModel, ModelStore};
use dermal_vision::{candidates, decode_rgb, render_heatmap_png, resize_to};

use crate::error::{PipelineError, Result};
use crate::format::{format_predictions, ClassResult};
use crate::governor::MemoryGovernor;

/// Per-call knobs. Unset fields fall back to the pipeline's configuration.
#[derive(Debug, Clone, Default)]
pub struct PredictOptions {
    /// Number of ranked results to return.
    pub top_k: Option<usize>,
    /// Whether to produce a saliency heatmap.
    pub explanation: Option<bool>,
}

/// One completed prediction.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    /// Ranked class results, highest confidence first.
    pub results: Vec<ClassResult>,
    /// Base64 PNG of the saliency overlay, when explanation succeeded.
    pub heatmap_base64: Option<String>,
    /// Name of the preprocessing method the model accepted.
    pub method: &'static str,
}

/// The image-to-prediction pipeline.
pub struct Pipeline {
    store: Arc<ModelStore>,
    config: PipelineConfig,
    governor: MemoryGovernor,
}

impl Pipeline {
    /// Create a pipeline over a model store.
    #[must_use]
    pub fn new(store: Arc<ModelStore>, config: PipelineConfig) -> Self {
        Self {
            store,
            config,
            governor: MemoryGovernor::new(),
        }
    }

    /// Create a pipeline from environment configuration.
    ///
    /// Honors the eager-preload flag: load failure at this point is logged
    /// and deferred to the first prediction, which will surface it.
    #[must_use]
    pub fn from_env() -> Self {
        let runtime = RuntimeConfig::from_env();
        let config = PipelineConfig::from_runtime(&runtime);
        let preload = runtime.preload;
        let store = Arc::new(ModelStore::from_runtime(runtime));

        if preload {
            if let Err(e) = store.acquire() {
                tracing::warn!(error = %e, "preload failed; deferring to first request");
            }
        }

        Self::new(store, config)
    }

    /// The model store backing this pipeline.
    #[must_use]
    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    /// The memory governor backing this pipeline.
    #[must_use]
    pub fn governor(&self) -> &MemoryGovernor {
        &self.governor
    }

    /// Classify an image, optionally with a saliency overlay.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Decode`] for undecodable bytes (raised before any
    /// model-handle mutation), [`PipelineError::ModelLoad`] when the model
    /// cannot be loaded, [`PipelineError::ExhaustedCandidates`] when every
    /// preprocessing variant is rejected. Explanation failures are not
    /// errors; they yield a prediction without a heatmap.
    pub fn predict(&self, bytes: &[u8], options: &PredictOptions) -> Result<Prediction> {
        let outcome = self.predict_inner(bytes, options);
        self.governor.reclaim();
        outcome
    }

    /// Classification-only convenience, defaults throughout and no heatmap.
    pub fn predict_simple(&self, bytes: &[u8]) -> Result<Vec<ClassResult>> {
        let options = PredictOptions {
            explanation: Some(false),
            ..Default::default()
        };
        Ok(self.predict(bytes, &options)?.results)
    }

    /// Evict the resident model and sweep the account.
    pub fn evict_model(&self) {
        self.store.evict();
        self.governor.reclaim();
    }

    fn predict_inner(&self, bytes: &[u8], options: &PredictOptions) -> Result<Prediction> {
        let started = Instant::now();

        let original = decode_rgb(bytes).map_err(|e| PipelineError::Decode(e.to_string()))?;
        let loaded = self.store.acquire()?;

        let edge = loaded.input_shape.height();
        let resized = resize_to(&original, edge, self.config.resize_filter);

        let device = Default::default();
        let mut accepted: Option<(ImageTensor<AutodiffNdArray>, Vec<f32>)> = None;
        for candidate in candidates::<AutodiffNdArray>(&resized, &device) {
            self.governor.register(candidate.byte_size() as u64);
            match loaded.model.predict(&candidate) {
                Ok(probs) => {
                    accepted = Some((candidate, probs));
                    break;
                }
                Err(e) => {
                    tracing::warn!(method = candidate.method(), error = %e, "candidate rejected");
                }
            }
        }
        let (input, probs) = accepted.ok_or(PipelineError::ExhaustedCandidates)?;

        let top_k = options.top_k.unwrap_or(self.config.top_k);
        let results = format_predictions(&probs, top_k);

        let explain = options.explanation.unwrap_or(self.config.explanation_enabled);
        let heatmap_base64 = if explain {
            self.explain(&loaded, &input, &resized)
        } else {
            None
        };

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            method = input.method(),
            explained = heatmap_base64.is_some(),
            "prediction complete"
        );

        Ok(Prediction {
            results,
            heatmap_base64,
            method: input.method(),
        })
    }

    /// The explanation path. Every failure here degrades to `None`.
    fn explain(
        &self,
        loaded: &LoadedModel,
        input: &ImageTensor<AutodiffNdArray>,
        resized: &image::RgbImage,
    ) -> Option<String> {
        let tree = loaded.model.layer_tree();
        let Some(target) = find_explainable_layer(&tree) else {
            tracing::warn!("no explainable layer; skipping heatmap");
            return None;
        };

        let heatmap =
            match compute_saliency_guarded(&self.store, loaded, input, &target, None) {
                Ok((heatmap, _)) => heatmap,
                Err(e) => {
                    tracing::warn!(layer = target.name(), error = %e, "saliency failed; skipping heatmap");
                    return None;
                }
            };

        match render_heatmap_png(resized, heatmap.values()) {
            Ok(encoded) => Some(encoded),
            Err(e) => {
                tracing::warn!(error = %e, "overlay rendering failed; skipping heatmap");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use dermal_models::{SkinNet, SkinNetConfig};
    use image::{Rgb, RgbImage};

    fn tiny_store(counter: Arc<AtomicUsize>) -> Arc<ModelStore> {
        Arc::new(ModelStore::with_loader(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let device = Default::default();
            let config = SkinNetConfig::new(7, 16)
                .with_stem_channels(2)
                .with_n_blocks(1)
                .with_head_channels(4);
            let model: SkinNet<AutodiffNdArray> = config.init(&device);
            let input_shape = model.input_shape();
            Ok(dermal_models::LoadedModel {
                model,
                input_shape,
                warmed: false,
            })
        }))
    }

    fn tiny_pipeline() -> (Pipeline, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        let store = tiny_store(counter.clone());
        (Pipeline::new(store, PipelineConfig::default()), counter)
    }

    fn png_bytes(rgb: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(16, 16, Rgb(rgb));
        let mut buf = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_predict_without_explanation() {
        let (pipeline, _) = tiny_pipeline();
        let options = PredictOptions {
            explanation: Some(false),
            ..Default::default()
        };

        let prediction = pipeline.predict(&png_bytes([200, 150, 100]), &options).unwrap();

        assert_eq!(prediction.results.len(), 7);
        assert!(prediction.heatmap_base64.is_none());
        assert_eq!(prediction.method, "efficientnet_v2");
        let total: f32 = prediction.results.iter().map(|r| r.probability).sum();
        assert!((total - 100.0).abs() < 0.1);
        for pair in prediction.results.windows(2) {
            assert!(pair[0].probability >= pair[1].probability);
        }
    }

    #[test]
    fn test_predict_with_explanation() {
        let (pipeline, _) = tiny_pipeline();
        let options = PredictOptions {
            explanation: Some(true),
            ..Default::default()
        };

        let prediction = pipeline.predict(&png_bytes([180, 60, 90]), &options).unwrap();

        let encoded = prediction.heatmap_base64.expect("heatmap expected");
        assert!(!encoded.is_empty());
    }

    #[test]
    fn test_explanation_toggle_does_not_change_results() {
        let (pipeline, _) = tiny_pipeline();
        let bytes = png_bytes([90, 120, 200]);

        let plain = pipeline
            .predict(&bytes, &PredictOptions { explanation: Some(false), ..Default::default() })
            .unwrap();
        let explained = pipeline
            .predict(&bytes, &PredictOptions { explanation: Some(true), ..Default::default() })
            .unwrap();

        assert_eq!(plain.results.len(), explained.results.len());
        for (a, b) in plain.results.iter().zip(explained.results.iter()) {
            assert_eq!(a.class, b.class);
            assert!((a.probability - b.probability).abs() < 1e-4);
        }
    }

    #[test]
    fn test_decode_failure_precedes_model_load() {
        let (pipeline, counter) = tiny_pipeline();

        let outcome = pipeline.predict(b"not an image", &PredictOptions::default());

        assert!(matches!(outcome, Err(PipelineError::Decode(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!pipeline.store().is_loaded());
    }

    #[test]
    fn test_top_k_override() {
        let (pipeline, _) = tiny_pipeline();
        let options = PredictOptions {
            top_k: Some(3),
            explanation: Some(false),
        };
        let prediction = pipeline.predict(&png_bytes([10, 10, 10]), &options).unwrap();
        assert_eq!(prediction.results.len(), 3);
    }

    #[test]
    fn test_repeated_runs_leave_governor_empty() {
        let (pipeline, counter) = tiny_pipeline();
        let bytes = png_bytes([77, 77, 77]);

        for _ in 0..5 {
            pipeline.predict(&bytes, &PredictOptions::default()).unwrap();
            assert_eq!(pipeline.governor().live_bytes(), 0);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_predict_simple() {
        let (pipeline, _) = tiny_pipeline();
        let results = pipeline.predict_simple(&png_bytes([30, 200, 40])).unwrap();
        assert_eq!(results.len(), 7);
    }

    #[test]
    fn test_evict_model_forces_reload() {
        let (pipeline, counter) = tiny_pipeline();
        let bytes = png_bytes([1, 2, 3]);

        pipeline.predict_simple(&bytes).unwrap();
        pipeline.evict_model();
        assert!(!pipeline.store().is_loaded());
        pipeline.predict_simple(&bytes).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
