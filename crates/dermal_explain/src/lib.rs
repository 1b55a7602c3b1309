//! # dermal_explain
//!
//! Gradient-based saliency for dermal-rs: activation capture and Grad-CAM
//! heatmap computation.
//!
//! Failures anywhere in this crate abort explanation generation only; the
//! classification result is never affected.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod capture;
mod error;
mod gradcam;
mod heatmap;

pub use capture::ActivationCapture;
pub use error::{ExplainError, Result};
pub use gradcam::{compute_saliency, compute_saliency_guarded};
pub use heatmap::{Heatmap, NOISE_FLOOR};
