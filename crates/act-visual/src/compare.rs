//! Per-pixel PNG comparison.
//!
//! The tolerance governs how different a single pixel may be before it
//! counts as a mismatch; the overall verdict is strict -- `match` means zero
//! mismatching pixels. Callers wanting a fuzzy image-level bar inspect
//! `diff_percentage` themselves.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use image::{GenericImageView, Rgba};
use serde::Serialize;

use act_types::BridgeError;

/// Default per-pixel tolerance.
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Color painted over mismatching pixels in the diff image.
const HIGHLIGHT: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Outcome of a comparison. Serializes with the camelCase keys the tool
/// surface returns to the agent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareResult {
    /// True only when no pixel differed beyond the tolerance.
    #[serde(rename = "match")]
    pub matches: bool,
    /// Count of mismatching pixels, or -1 when dimensions differed.
    pub diff_pixels: i64,
    /// Pixel count of the expected image.
    pub total_pixels: u64,
    /// 100 * diff / total (100 on dimension mismatch).
    pub diff_percentage: f64,
    /// Base64 PNG with mismatches highlighted; absent on dimension mismatch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_image_base64: Option<String>,
}

/// Compare two PNG byte blobs with a per-pixel tolerance in [0, 1].
///
/// Dimension mismatches short-circuit with `diff_pixels: -1` and no diff
/// image. Undecodable input is *invalid-input*.
pub fn compare(actual: &[u8], expected: &[u8], threshold: f64) -> Result<CompareResult, BridgeError> {
    let threshold = threshold.clamp(0.0, 1.0);

    let actual = image::load_from_memory(actual)
        .map_err(|e| BridgeError::invalid_input(format!("failed to decode actual image: {e}")))?;
    let expected = image::load_from_memory(expected)
        .map_err(|e| BridgeError::invalid_input(format!("failed to decode expected image: {e}")))?;

    let (ew, eh) = expected.dimensions();
    if actual.dimensions() != (ew, eh) {
        tracing::debug!(
            actual = ?actual.dimensions(),
            expected = ?(ew, eh),
            "dimension mismatch"
        );
        return Ok(CompareResult {
            matches: false,
            diff_pixels: -1,
            total_pixels: u64::from(ew) * u64::from(eh),
            diff_percentage: 100.0,
            diff_image_base64: None,
        });
    }

    let actual = actual.to_rgba8();
    let expected_rgba = expected.to_rgba8();
    let mut diff_image = expected_rgba.clone();
    let mut diff_pixels = 0u64;

    for y in 0..eh {
        for x in 0..ew {
            let delta = pixel_delta(actual.get_pixel(x, y), expected_rgba.get_pixel(x, y));
            if delta > threshold {
                diff_pixels += 1;
                diff_image.put_pixel(x, y, HIGHLIGHT);
            }
        }
    }

    let total_pixels = u64::from(ew) * u64::from(eh);
    let diff_percentage = if total_pixels == 0 {
        0.0
    } else {
        100.0 * diff_pixels as f64 / total_pixels as f64
    };

    let mut buf = Vec::new();
    diff_image
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| BridgeError::storage(format!("failed to encode diff image: {e}")))?;

    Ok(CompareResult {
        matches: diff_pixels == 0,
        diff_pixels: diff_pixels as i64,
        total_pixels,
        diff_percentage,
        diff_image_base64: Some(B64.encode(&buf)),
    })
}

/// Normalized RGBA distance between two pixels, in [0, 1].
fn pixel_delta(a: &Rgba<u8>, b: &Rgba<u8>) -> f64 {
    let total: f64 = (0..4)
        .map(|c| (f64::from(a[c]) - f64::from(b[c])).abs())
        .sum();
    total / (255.0 * 4.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    fn solid_png(width: u32, height: u32, color: Rgba<u8>) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, color);
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn identical_images_match_at_any_tolerance() {
        let png = solid_png(20, 10, Rgba([10, 200, 30, 255]));
        for threshold in [0.0, 0.1, 0.5, 1.0] {
            let result = compare(&png, &png, threshold).unwrap();
            assert!(result.matches, "threshold {threshold}");
            assert_eq!(result.diff_pixels, 0);
            assert_eq!(result.total_pixels, 200);
            assert_eq!(result.diff_percentage, 0.0);
            assert!(result.diff_image_base64.is_some());
        }
    }

    #[test]
    fn fully_different_images_mismatch_everywhere() {
        let red = solid_png(8, 8, Rgba([255, 0, 0, 255]));
        let blue = solid_png(8, 8, Rgba([0, 0, 255, 255]));

        let result = compare(&red, &blue, DEFAULT_THRESHOLD).unwrap();
        assert!(!result.matches);
        assert_eq!(result.diff_pixels, 64);
        assert_eq!(result.diff_percentage, 100.0);
    }

    #[test]
    fn tolerance_absorbs_small_deltas() {
        let base = solid_png(4, 4, Rgba([100, 100, 100, 255]));
        let nudged = solid_png(4, 4, Rgba([104, 100, 100, 255]));

        // Delta = 4 / 1020 ~ 0.004: below the default tolerance...
        let loose = compare(&nudged, &base, DEFAULT_THRESHOLD).unwrap();
        assert!(loose.matches);

        // ...but a zero tolerance flags every pixel.
        let strict = compare(&nudged, &base, 0.0).unwrap();
        assert!(!strict.matches);
        assert_eq!(strict.diff_pixels, 16);
    }

    #[test]
    fn dimension_mismatch_is_the_sentinel_result() {
        let small = solid_png(4, 4, Rgba([0, 0, 0, 255]));
        let large = solid_png(8, 8, Rgba([0, 0, 0, 255]));

        let result = compare(&small, &large, DEFAULT_THRESHOLD).unwrap();
        assert!(!result.matches);
        assert_eq!(result.diff_pixels, -1);
        assert_eq!(result.total_pixels, 64);
        assert_eq!(result.diff_percentage, 100.0);
        assert!(result.diff_image_base64.is_none());
    }

    #[test]
    fn diff_image_highlights_only_changed_pixels() {
        let base = solid_png(3, 1, Rgba([0, 255, 0, 255]));
        let mut changed: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(3, 1, Rgba([0, 255, 0, 255]));
        changed.put_pixel(1, 0, Rgba([255, 255, 255, 255]));
        let mut changed_png = Vec::new();
        changed
            .write_to(
                &mut std::io::Cursor::new(&mut changed_png),
                image::ImageFormat::Png,
            )
            .unwrap();

        let result = compare(&changed_png, &base, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(result.diff_pixels, 1);

        let diff_bytes = B64.decode(result.diff_image_base64.unwrap()).unwrap();
        let diff = image::load_from_memory(&diff_bytes).unwrap().to_rgba8();
        assert_eq!(diff.get_pixel(0, 0), &Rgba([0, 255, 0, 255]));
        assert_eq!(diff.get_pixel(1, 0), &HIGHLIGHT);
        assert_eq!(diff.get_pixel(2, 0), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn undecodable_input_is_invalid() {
        let png = solid_png(2, 2, Rgba([0, 0, 0, 255]));
        assert!(matches!(
            compare(b"not a png", &png, 0.1).unwrap_err(),
            BridgeError::InvalidInput(_)
        ));
        assert!(matches!(
            compare(&png, b"not a png", 0.1).unwrap_err(),
            BridgeError::InvalidInput(_)
        ));
    }

    #[test]
    fn out_of_range_threshold_is_clamped() {
        let png = solid_png(2, 2, Rgba([5, 5, 5, 255]));
        assert!(compare(&png, &png, 7.5).unwrap().matches);
        assert!(compare(&png, &png, -1.0).unwrap().matches);
    }

    #[test]
    fn result_serializes_with_match_key() {
        let png = solid_png(2, 2, Rgba([1, 2, 3, 255]));
        let result = compare(&png, &png, 0.1).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["match"], true);
        assert_eq!(json["diffPixels"], 0);
        assert_eq!(json["totalPixels"], 4);
        assert!(json.get("diff_pixels").is_none());
    }
}
