//! # dermal_vision
//!
//! Imaging for dermal-rs: decode and resize, the preprocessing candidate
//! chain, and heatmap overlay rendering (jet colormap, alpha blend, base64
//! PNG).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod colormap;
mod error;
mod overlay;
mod preprocess;

pub use colormap::jet;
pub use error::{Result, VisionError};
pub use overlay::{encode_png_base64, overlay_heatmap, render_heatmap_png, OVERLAY_ALPHA};
pub use preprocess::{candidates, decode_rgb, resize_to};
