//! Heatmap upsampling, colorization, and overlay rendering.
//!
//! The saliency map arrives at the target layer's spatial resolution, far
//! below image resolution. It is upsampled bilinearly, pushed through the
//! jet colormap, and alpha-blended over the resized original. The blend goes
//! out as a base64 PNG; any failure here degrades to "no heatmap" upstream.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{imageops::FilterType, ImageBuffer, Luma, RgbImage};
use ndarray::Array2;

use crate::colormap::jet;
use crate::error::{Result, VisionError};

/// Fixed opacity of the colorized heatmap over the original image.
pub const OVERLAY_ALPHA: f32 = 0.4;

/// Blend a normalized saliency map over the image it explains.
///
/// The map is bilinearly upsampled to the image's resolution first. Output
/// dimensions always equal the input image's.
///
/// # Errors
///
/// Returns [`VisionError::Heatmap`] when the map is empty.
pub fn overlay_heatmap(original: &RgbImage, heat: &Array2<f32>) -> Result<RgbImage> {
    let (h, w) = heat.dim();
    if h == 0 || w == 0 {
        return Err(VisionError::Heatmap(format!("empty map ({h}x{w})")));
    }

    let raw: Vec<f32> = heat.iter().copied().collect();
    let low: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_raw(w as u32, h as u32, raw)
            .ok_or_else(|| VisionError::Heatmap(format!("map buffer mismatch ({h}x{w})")))?;

    let upsampled = image::imageops::resize(
        &low,
        original.width(),
        original.height(),
        FilterType::Triangle,
    );

    let mut out = original.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let heat_rgb = jet(upsampled.get_pixel(x, y).0[0]);
        for c in 0..3 {
            let base = f32::from(pixel.0[c]);
            let overlay = f32::from(heat_rgb[c]);
            pixel.0[c] = (base * (1.0 - OVERLAY_ALPHA) + overlay * OVERLAY_ALPHA) as u8;
        }
    }
    Ok(out)
}

/// Encode an image as a base64 PNG string for transport.
///
/// # Errors
///
/// Returns [`VisionError::Encode`] on PNG serialization failure.
pub fn encode_png_base64(img: &RgbImage) -> Result<String> {
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| VisionError::Encode(e.to_string()))?;
    Ok(STANDARD.encode(buf.into_inner()))
}

/// Full synthesis: upsample, colorize, blend, encode.
pub fn render_heatmap_png(original: &RgbImage, heat: &Array2<f32>) -> Result<String> {
    encode_png_base64(&overlay_heatmap(original, heat)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use ndarray::array;

    const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];

    fn gray(edge: u32) -> RgbImage {
        RgbImage::from_pixel(edge, edge, Rgb([100, 100, 100]))
    }

    #[test]
    fn test_overlay_preserves_dimensions() {
        let heat = array![[0.0, 1.0], [0.5, 0.25]];
        let out = overlay_heatmap(&gray(16), &heat).unwrap();
        assert_eq!(out.dimensions(), (16, 16));
    }

    #[test]
    fn test_overlay_changes_pixels() {
        let heat = Array2::from_elem((4, 4), 1.0);
        let out = overlay_heatmap(&gray(8), &heat).unwrap();
        // A hot map shifts every pixel toward red.
        let p = out.get_pixel(4, 4).0;
        assert!(p[0] > p[2]);
        assert_ne!(p, [100, 100, 100]);
    }

    #[test]
    fn test_empty_map_rejected() {
        let heat = Array2::<f32>::zeros((0, 0));
        assert!(matches!(
            overlay_heatmap(&gray(8), &heat),
            Err(VisionError::Heatmap(_))
        ));
    }

    #[test]
    fn test_base64_png_round_trip() {
        let encoded = encode_png_base64(&gray(8)).unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(&bytes[..4], &PNG_MAGIC);

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (8, 8));
    }

    #[test]
    fn test_render_pipeline() {
        let heat = array![[0.1, 0.9], [0.9, 0.1]];
        let encoded = render_heatmap_png(&gray(32), &heat).unwrap();
        assert!(!encoded.is_empty());
        assert!(STANDARD.decode(&encoded).is_ok());
    }
}
