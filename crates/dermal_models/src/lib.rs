//! # dermal_models
//!
//! The skin-condition classifier and its lifecycle for dermal-rs.
//!
//! This crate provides:
//! - [`SkinNet`], an EfficientNetV2-flavored convolutional classifier
//! - [`LayerTree`] and the explainable-layer locator
//! - Checkpoint load/save via Burn's record system
//! - [`ModelStore`], the process-wide lazy model handle

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod checkpoint;
mod error;
mod handle;
mod layers;
mod net;

pub use checkpoint::{load_record, metadata_path_for, save_model, ArtifactMetadata};
pub use error::{ModelError, Result};
pub use handle::{AutodiffNdArray, LoadedModel, ModelStore};
pub use layers::{find_explainable_layer, LayerKind, LayerNode, LayerRef, LayerTree, NodeId};
pub use net::{MbBlock, SkinNet, SkinNetConfig};
