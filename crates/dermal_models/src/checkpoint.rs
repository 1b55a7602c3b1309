//! Model checkpointing and artifact metadata.
//!
//! Weights travel as Named MessagePack files through Burn's record system,
//! at full or half precision. Next to the weights lives a small JSON sidecar
//! describing the artifact: architecture name, declared input shape, and the
//! model configuration. The sidecar is what load-time shape introspection
//! reads; when it is absent or unreadable the loader falls back to a
//! hardcoded default shape.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, HalfPrecisionSettings, NamedMpkFileRecorder, Recorder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use dermal_core::{ImgShape, Precision};

use crate::error::{ModelError, Result};
use crate::net::SkinNetConfig;

/// Save a model's weights to a checkpoint file.
///
/// Training-only state (optimizer moments, schedules) is never part of the
/// record; only module parameters are written.
pub fn save_model<B, M>(model: &M, path: impl AsRef<Path>, precision: Precision) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref().to_path_buf();
    let record = model.clone().into_record();

    match precision {
        Precision::Full => {
            let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
            recorder
                .record(record, path)
                .map_err(|e| ModelError::Save(e.to_string()))?;
        }
        Precision::Half => {
            let recorder = NamedMpkFileRecorder::<HalfPrecisionSettings>::new();
            recorder
                .record(record, path)
                .map_err(|e| ModelError::Save(e.to_string()))?;
        }
    }

    Ok(())
}

/// Load a model record from a checkpoint file.
pub fn load_record<B, M>(
    path: impl AsRef<Path>,
    precision: Precision,
    device: &B::Device,
) -> Result<M::Record>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref().to_path_buf();

    let record = match precision {
        Precision::Full => {
            let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
            recorder
                .load(path, device)
                .map_err(|e| ModelError::Load(e.to_string()))?
        }
        Precision::Half => {
            let recorder = NamedMpkFileRecorder::<HalfPrecisionSettings>::new();
            recorder
                .load(path, device)
                .map_err(|e| ModelError::Load(e.to_string()))?
        }
    };

    Ok(record)
}

/// Sidecar path for a given artifact path (same stem, `.json` extension).
#[must_use]
pub fn metadata_path_for(artifact: impl AsRef<Path>) -> PathBuf {
    artifact.as_ref().with_extension("json")
}

/// Self-describing artifact metadata stored next to the weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Model architecture name.
    pub arch: String,
    /// Declared input shape of the saved graph.
    pub input_shape: ImgShape,
    /// Precision the weights were written at.
    pub precision: Precision,
    /// Model configuration as JSON.
    pub config_json: String,
    /// Class labels in output-index order, if recorded.
    pub class_names: Vec<String>,
    /// Additional metadata.
    pub extra: HashMap<String, String>,
}

impl ArtifactMetadata {
    /// Create new metadata for an architecture.
    pub fn new(arch: impl Into<String>, input_shape: ImgShape) -> Self {
        Self {
            arch: arch.into(),
            input_shape,
            precision: Precision::Full,
            config_json: String::new(),
            class_names: Vec::new(),
            extra: HashMap::new(),
        }
    }

    /// Attach the model configuration.
    #[must_use]
    pub fn with_config<C: Serialize>(mut self, config: &C) -> Self {
        self.config_json = serde_json::to_string(config).unwrap_or_default();
        self
    }

    /// Set the weight precision.
    #[must_use]
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Set the class label list.
    #[must_use]
    pub fn with_class_names(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.class_names = names.into_iter().collect();
        self
    }

    /// Add extra metadata.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Parse the stored configuration as a typed config.
    pub fn config<C: DeserializeOwned>(&self) -> Result<C> {
        serde_json::from_str(&self.config_json)
            .map_err(|e| ModelError::Load(format!("invalid config_json: {e}")))
    }

    /// Parse the stored configuration as a [`SkinNetConfig`].
    pub fn skinnet_config(&self) -> Result<SkinNetConfig> {
        self.config()
    }

    /// Save metadata to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| ModelError::Save(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load metadata from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| ModelError::Load(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_roundtrip_fields() {
        let config = SkinNetConfig::new(7, 300);
        let meta = ArtifactMetadata::new("SkinNet", ImgShape::square(300))
            .with_config(&config)
            .with_precision(Precision::Half)
            .with_extra("stage", "1");

        assert_eq!(meta.arch, "SkinNet");
        assert_eq!(meta.precision, Precision::Half);
        assert_eq!(meta.extra.get("stage"), Some(&"1".to_string()));

        let parsed = meta.skinnet_config().unwrap();
        assert_eq!(parsed.n_classes, 7);
        assert_eq!(parsed.image_size, 300);
    }

    #[test]
    fn test_metadata_save_load() {
        let dir = std::env::temp_dir().join("dermal_meta_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("artifact.json");

        let meta = ArtifactMetadata::new("SkinNet", ImgShape::square(224));
        meta.save(&path).unwrap();
        let restored = ArtifactMetadata::load(&path).unwrap();
        assert_eq!(restored.input_shape, ImgShape::square(224));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_metadata_path_for() {
        let p = metadata_path_for("models/dermatology_stage1.mpk");
        assert_eq!(p, PathBuf::from("models/dermatology_stage1.json"));
    }

    #[test]
    fn test_invalid_config_json() {
        let meta = ArtifactMetadata::new("SkinNet", ImgShape::square(300));
        assert!(meta.skinnet_config().is_err());
    }
}
