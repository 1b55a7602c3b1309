//! # dermal_core
//!
//! Core types for dermal-rs skin-condition image classification.
//!
//! This crate provides:
//! - [`ImgShape`] for model input shape metadata
//! - [`ImageTensor`] wrapper for Burn tensors produced by preprocessing
//! - [`Precision`] for full/half weight precision selection
//! - [`RuntimeConfig`] and [`PipelineConfig`] configuration surfaces
//! - The fixed class label set and error types
//!
//! ## Shape Convention
//!
//! Image metadata follows the convention `(H, W, C)`; tensors handed to the
//! model are `(1, C, H, W)` per the backend's channels-first layout.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod labels;
mod precision;
mod shape;
mod tensor;

pub use config::{PipelineConfig, ResizeFilter, RuntimeConfig, DEFAULT_TOP_K};
pub use error::{CoreError, Result};
pub use labels::{class_label, CLASS_NAMES, N_CLASSES};
pub use precision::Precision;
pub use shape::{ImgShape, DEFAULT_IMG_SIZE};
pub use tensor::ImageTensor;

/// Backend type aliases for convenience.
pub mod backend {
    /// CPU inference backend.
    pub use burn_ndarray::NdArray;
}
