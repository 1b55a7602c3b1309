//! # dermal_infer
//!
//! The end-to-end classification pipeline for dermal-rs: candidate
//! selection, result formatting, optional explanation, and per-run memory
//! accounting.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod format;
mod governor;
mod pipeline;

pub use error::{PipelineError, Result};
pub use format::{format_predictions, ClassResult};
pub use governor::MemoryGovernor;
pub use pipeline::{Pipeline, PredictOptions, Prediction};
