//! Decode, resize, and the preprocessing candidate chain.
//!
//! A request body can be any common raster format. It is decoded to RGB,
//! resized to the model's declared input edge, and turned into a fixed
//! priority-ordered list of normalization candidates. The pipeline feeds
//! candidates to the model in order and accepts the first one whose forward
//! pass succeeds.

use burn::prelude::*;
use burn::tensor::TensorData;
use image::{imageops::FilterType, RgbImage};

use dermal_core::{ImageTensor, ResizeFilter};

use crate::error::{Result, VisionError};

/// Decode raw request bytes into an RGB image.
///
/// # Errors
///
/// Returns [`VisionError::Decode`] when the bytes are not a recognizable
/// image. The pipeline surfaces this before touching the model handle.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(bytes).map_err(|e| VisionError::Decode(e.to_string()))?;
    Ok(img.to_rgb8())
}

/// Resize to a square model input edge.
#[must_use]
pub fn resize_to(img: &RgbImage, edge: usize, filter: ResizeFilter) -> RgbImage {
    let edge = edge as u32;
    if img.width() == edge && img.height() == edge {
        return img.clone();
    }
    image::imageops::resize(img, edge, edge, filter_type(filter))
}

pub(crate) fn filter_type(filter: ResizeFilter) -> FilterType {
    match filter {
        ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        ResizeFilter::Bilinear => FilterType::Triangle,
        ResizeFilter::CatmullRom => FilterType::CatmullRom,
        ResizeFilter::Nearest => FilterType::Nearest,
    }
}

/// Build the normalization candidates for one resized image, in priority
/// order.
///
/// First the EfficientNetV2 scaling (`x / 127.5 - 1`, values in `[-1, 1]`),
/// then the naive `x / 255` fallback. Each build is isolated: a failure is
/// logged and skipped, and the remaining candidates are still produced.
pub fn candidates<B: Backend>(img: &RgbImage, device: &B::Device) -> Vec<ImageTensor<B>> {
    let specs: [(&'static str, fn(f32) -> f32); 2] = [
        ("efficientnet_v2", |v| v / 127.5 - 1.0),
        ("div255", |v| v / 255.0),
    ];

    let mut out = Vec::with_capacity(specs.len());
    for (method, scale) in specs {
        match build_candidate(img, method, scale, device) {
            Ok(tensor) => out.push(tensor),
            Err(e) => {
                tracing::warn!(method, error = %e, "preprocessing candidate failed; skipping");
            }
        }
    }
    out
}

/// One candidate: channels-first float tensor with the scaling applied.
fn build_candidate<B: Backend>(
    img: &RgbImage,
    method: &'static str,
    scale: fn(f32) -> f32,
    device: &B::Device,
) -> Result<ImageTensor<B>> {
    let (w, h) = (img.width() as usize, img.height() as usize);

    let mut data = vec![0.0f32; 3 * h * w];
    for (x, y, pixel) in img.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            data[c * h * w + y * w + x] = scale(f32::from(pixel.0[c]));
        }
    }

    let tensor = Tensor::from_data(TensorData::new(data, [1, 3, h, w]), device);
    ImageTensor::new(tensor, method).map_err(|e| VisionError::Candidate {
        method,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dermal_core::backend::NdArray;
    use image::Rgb;

    fn solid(edge: u32, rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(edge, edge, Rgb(rgb))
    }

    fn png_bytes(img: &RgbImage) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img.clone())
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_round_trip() {
        let img = solid(8, [10, 20, 30]);
        let decoded = decode_rgb(&png_bytes(&img)).unwrap();
        assert_eq!(decoded.dimensions(), (8, 8));
        assert_eq!(decoded.get_pixel(3, 3).0, [10, 20, 30]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_rgb(b"definitely not an image"),
            Err(VisionError::Decode(_))
        ));
    }

    #[test]
    fn test_resize_to_model_edge() {
        let img = solid(64, [128, 128, 128]);
        let resized = resize_to(&img, 16, ResizeFilter::Lanczos3);
        assert_eq!(resized.dimensions(), (16, 16));
    }

    #[test]
    fn test_candidate_order_and_tags() {
        let img = solid(4, [255, 0, 255]);
        let device = Default::default();
        let cands = candidates::<NdArray>(&img, &device);

        assert_eq!(cands.len(), 2);
        assert_eq!(cands[0].method(), "efficientnet_v2");
        assert_eq!(cands[1].method(), "div255");
        assert_eq!(cands[0].inner().dims(), [1, 3, 4, 4]);
    }

    #[test]
    fn test_candidate_value_ranges() {
        let img = solid(2, [255, 0, 255]);
        let device = Default::default();
        let cands = candidates::<NdArray>(&img, &device);

        let eff: Vec<f32> = cands[0].inner().clone().into_data().to_vec().unwrap();
        // Channels first: 4 red values, 4 green, 4 blue.
        assert!((eff[0] - 1.0).abs() < 1e-6);
        assert!((eff[4] - (-1.0)).abs() < 1e-6);

        let naive: Vec<f32> = cands[1].inner().clone().into_data().to_vec().unwrap();
        assert!((naive[0] - 1.0).abs() < 1e-6);
        assert!(naive[4].abs() < 1e-6);
    }
}
