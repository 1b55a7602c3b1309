//! Process-wide model handle.
//!
//! [`ModelStore`] owns the lazily-loaded classifier for the lifetime of the
//! process. The load path is guarded by double-checked locking so concurrent
//! first requests produce exactly one load sequence; steady-state reads are
//! lock-free. A separate capture lock serializes gradient-capture windows,
//! which need exclusive use of the handle, without blocking plain
//! classification.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use burn::module::{AutodiffModule, Module};
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use parking_lot::{Mutex, MutexGuard, RwLock};

use dermal_core::{ImageTensor, ImgShape, RuntimeConfig};

use crate::checkpoint::{load_record, metadata_path_for, ArtifactMetadata};
use crate::error::Result;
use crate::net::{SkinNet, SkinNetConfig};

/// Autodiff-enabled CPU backend used for gradient capture.
pub type AutodiffNdArray = Autodiff<NdArray>;

/// A fully loaded and warmed classifier.
///
/// Invariant: never partially initialized. A `LoadedModel` published by the
/// store has weights applied and the warm-up outcome recorded; there is no
/// in-between state observable by callers.
pub struct LoadedModel {
    /// The classifier on the autodiff backend (gradient capture path).
    pub model: SkinNet<AutodiffNdArray>,
    /// Declared input shape, from the artifact or the hardcoded fallback.
    pub input_shape: ImgShape,
    /// Whether the warm-up pass completed. Informational; the handle is
    /// usable either way.
    pub warmed: bool,
}

impl LoadedModel {
    /// The classifier on the plain inference backend.
    #[must_use]
    pub fn infer_model(&self) -> SkinNet<NdArray> {
        self.model.valid()
    }
}

type Loader = Box<dyn Fn() -> Result<LoadedModel> + Send + Sync>;

/// Lazy, thread-safe owner of the process's single model instance.
pub struct ModelStore {
    slot: RwLock<Option<Arc<LoadedModel>>>,
    load_lock: Mutex<()>,
    capture_lock: Mutex<()>,
    loader: Loader,
}

impl ModelStore {
    /// Create a store that loads from the configured artifact path.
    #[must_use]
    pub fn from_runtime(config: RuntimeConfig) -> Self {
        Self::with_loader(move || load_from_artifact(&config))
    }

    /// Create a store with a custom load routine.
    pub fn with_loader<F>(loader: F) -> Self
    where
        F: Fn() -> Result<LoadedModel> + Send + Sync + 'static,
    {
        Self {
            slot: RwLock::new(None),
            load_lock: Mutex::new(()),
            capture_lock: Mutex::new(()),
            loader: Box::new(loader),
        }
    }

    /// Get the loaded model, loading it on first use.
    ///
    /// Idempotent and thread-safe: check without the lock, take the load
    /// lock, check again, load, publish. All concurrent callers receive the
    /// same instance.
    ///
    /// # Errors
    ///
    /// Returns a load error when the artifact cannot be read; this is fatal
    /// to serving capability and is surfaced, not recovered.
    pub fn acquire(&self) -> Result<Arc<LoadedModel>> {
        if let Some(model) = self.slot.read().clone() {
            return Ok(model);
        }

        let _guard = self.load_lock.lock();
        if let Some(model) = self.slot.read().clone() {
            return Ok(model);
        }

        let started = Instant::now();
        let mut loaded = (self.loader)()?;
        loaded.warmed = warm_up(&loaded);

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            input_shape = %loaded.input_shape,
            warmed = loaded.warmed,
            "model loaded"
        );

        let model = Arc::new(loaded);
        *self.slot.write() = Some(model.clone());
        Ok(model)
    }

    /// Whether a model is currently resident.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Release the handle; the next [`acquire`](Self::acquire) reloads from
    /// disk. Outstanding `Arc`s keep their instance alive until dropped.
    pub fn evict(&self) {
        let evicted = self.slot.write().take().is_some();
        if evicted {
            tracing::info!("model evicted; next acquire reloads from disk");
        }
    }

    /// Exclusive guard for a gradient-capture window on this handle.
    ///
    /// Distinct from the load lock: classification stays fully concurrent
    /// while one capture runs, but two captures never interleave.
    pub fn capture_guard(&self) -> MutexGuard<'_, ()> {
        self.capture_lock.lock()
    }
}

/// One throwaway zero-tensor forward pass to force lazy kernel and graph
/// materialization before real traffic. Failure is logged, never propagated.
fn warm_up(loaded: &LoadedModel) -> bool {
    let device = Default::default();
    let shape = loaded.input_shape;
    let model = loaded.infer_model();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let dummy: ImageTensor<NdArray> = ImageTensor::zeros(shape, &device);
        let _ = model.forward(dummy.into_inner());
    }));

    match outcome {
        Ok(()) => {
            tracing::debug!(shape = %shape, "warm-up pass complete");
            true
        }
        Err(_) => {
            tracing::warn!(shape = %shape, "warm-up failed; handle still usable");
            false
        }
    }
}

/// Load the classifier from the configured on-disk artifact.
///
/// Shape and configuration introspection reads the metadata sidecar; when it
/// is missing or unreadable the hardcoded default shape applies (logged, not
/// fatal). A disagreement between the sidecar and the configured default is
/// a warning, and the artifact wins.
fn load_from_artifact(config: &RuntimeConfig) -> Result<LoadedModel> {
    let device = Default::default();
    tracing::info!(path = %config.model_path.display(), "loading model");

    let net_config = match ArtifactMetadata::load(metadata_path_for(&config.model_path)) {
        Ok(meta) => {
            let mut net_config = meta
                .skinnet_config()
                .unwrap_or_else(|_| SkinNetConfig::default());
            if meta.input_shape.height() != net_config.image_size {
                tracing::warn!(
                    declared = %meta.input_shape,
                    configured = net_config.image_size,
                    "artifact input shape disagrees with configuration; artifact wins"
                );
            }
            net_config.image_size = meta.input_shape.height();
            net_config
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                fallback = ImgShape::fallback().height(),
                "artifact metadata unavailable; using default input shape"
            );
            SkinNetConfig::default()
        }
    };

    let model: SkinNet<AutodiffNdArray> = net_config.init(&device);
    let record = load_record::<AutodiffNdArray, SkinNet<AutodiffNdArray>>(
        &config.model_path,
        config.precision,
        &device,
    )?;
    let model = model.load_record(record);
    let input_shape = model.input_shape();

    Ok(LoadedModel {
        model,
        input_shape,
        warmed: false,
    })
}
