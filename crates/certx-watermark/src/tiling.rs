//! Vertical tiling rule shared by the document and image paths.
//!
//! Positions are fractions of the page or image height. The PDF path
//! measures them from the bottom edge and the raster path from the top
//! edge; the fractions themselves are identical for identical inputs.

/// Largest margin ratio honoured; anything above leaves no usable band.
pub const MAX_MARGIN: f64 = 0.45;

/// Compute `count` label positions within the band `[margin, 1 - margin]`.
///
/// - `margin` is clamped to `[0, 0.45]` (NaN counts as 0).
/// - `count <= 1` yields a single position at the band centre.
/// - Otherwise positions are evenly spaced and include both band ends.
pub fn positions(count: u32, margin: f64) -> Vec<f64> {
    let margin = if margin.is_nan() {
        0.0
    } else {
        margin.clamp(0.0, MAX_MARGIN)
    };
    let available = (1.0 - margin * 2.0).max(0.0);
    if count <= 1 {
        return vec![margin + available / 2.0];
    }
    if available == 0.0 {
        return vec![0.5; count as usize];
    }
    let steps = f64::from(count - 1);
    (0..count)
        .map(|idx| margin + available * f64::from(idx) / steps)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_position_is_band_centre() {
        assert_eq!(positions(1, 0.12), vec![0.12 + (1.0 - 0.24) / 2.0]);
        assert_eq!(positions(0, 0.2), vec![0.5]);
    }

    #[test]
    fn three_positions_span_band() {
        let p = positions(3, 0.12);
        assert_eq!(p.len(), 3);
        assert!((p[0] - 0.12).abs() < 1e-12);
        assert!((p[1] - 0.5).abs() < 1e-12);
        assert!((p[2] - 0.88).abs() < 1e-12);
    }

    #[test]
    fn margin_is_clamped() {
        assert_eq!(positions(2, -1.0), vec![0.0, 1.0]);
        let p = positions(2, 0.9);
        assert!((p[0] - 0.45).abs() < 1e-12);
        assert!((p[1] - 0.55).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn positions_are_sorted_and_inside_band(count in 0u32..40, margin in -1.0f64..1.0) {
            let p = positions(count, margin);
            let m = margin.clamp(0.0, MAX_MARGIN);
            prop_assert_eq!(p.len(), count.max(1) as usize);
            for w in p.windows(2) {
                prop_assert!(w[0] <= w[1]);
            }
            for v in &p {
                prop_assert!(*v >= m - 1e-12 && *v <= 1.0 - m + 1e-12);
            }
        }

        #[test]
        fn single_position_formula(margin in 0.0f64..0.45) {
            let p = positions(1, margin);
            prop_assert!((p[0] - (margin + (1.0 - 2.0 * margin) / 2.0)).abs() < 1e-12);
        }
    }
}
