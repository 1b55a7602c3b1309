//! Jet colormap.

/// Map a normalized saliency value to a jet RGB color.
///
/// Low values render blue, the middle green, high values red. Input is
/// clamped to `[0, 1]`.
#[must_use]
pub fn jet(v: f32) -> [u8; 3] {
    let v = v.clamp(0.0, 1.0);
    let channel = |center: f32| {
        let c = 1.5 - (4.0 * v - center).abs();
        (c.clamp(0.0, 1.0) * 255.0) as u8
    };
    [channel(3.0), channel(2.0), channel(1.0)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cold_end_is_blue() {
        let [r, g, b] = jet(0.0);
        assert!(b > r && b > g);
    }

    #[test]
    fn test_hot_end_is_red() {
        let [r, g, b] = jet(1.0);
        assert!(r > g && r > b);
    }

    #[test]
    fn test_midpoint_peaks_green() {
        let [_, g, _] = jet(0.5);
        assert_eq!(g, 255);
    }

    #[test]
    fn test_out_of_range_clamped() {
        assert_eq!(jet(-3.0), jet(0.0));
        assert_eq!(jet(7.0), jet(1.0));
    }
}
