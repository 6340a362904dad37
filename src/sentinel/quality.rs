//! Document image quality scoring for Ring 3.
//!
//! Each scorer is an independent service over a grayscale raster:
//! - `LaplacianScorer`: variance of the 3x3 Laplacian response (sharpness).
//!   Blurry documents < 100, sharp text > 500.
//! - `IntensityVarianceScorer`: variance of raw pixel intensities. Coarser,
//!   catches flat or washed-out scans but not soft focus.

use image::GrayImage;

use super::error::{CapabilityUnavailable, DocumentImageError};
use super::stats::ManualStatistics;
use super::traits::{QualityScorer, StatisticsBackend};

// ═══════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════

/// Minimum valid image size in bytes (smallest valid PNG is ~67 bytes).
const MIN_IMAGE_BYTES: usize = 67;

// ═══════════════════════════════════════════════════════════
// Decoding
// ═══════════════════════════════════════════════════════════

/// Validate, decode and convert document bytes to grayscale.
pub fn decode_document(bytes: &[u8], max_bytes: usize) -> Result<GrayImage, DocumentImageError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(DocumentImageError::TooSmall);
    }
    if bytes.len() > max_bytes {
        return Err(DocumentImageError::TooLarge {
            limit_mb: max_bytes / (1024 * 1024),
        });
    }
    let img = image::load_from_memory(bytes).map_err(|e| DocumentImageError::Decode(e.to_string()))?;
    Ok(img.to_luma8())
}

// ═══════════════════════════════════════════════════════════
// Scorers
// ═══════════════════════════════════════════════════════════

/// Laplacian variance, kernel `[0,1,0; 1,-4,1; 0,1,0]`.
pub struct LaplacianScorer;

impl QualityScorer for LaplacianScorer {
    fn name(&self) -> &'static str {
        "laplacian_variance"
    }

    fn score(&self, img: &GrayImage) -> Result<f64, CapabilityUnavailable> {
        let (w, h) = (img.width(), img.height());
        if w < 3 || h < 3 {
            return Err(CapabilityUnavailable::new(
                "laplacian_variance",
                format!("{w}x{h} raster is smaller than the 3x3 kernel"),
            ));
        }

        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut count = 0u64;

        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let center = img.get_pixel(x, y).0[0] as f64;
                let top = img.get_pixel(x, y - 1).0[0] as f64;
                let bottom = img.get_pixel(x, y + 1).0[0] as f64;
                let left = img.get_pixel(x - 1, y).0[0] as f64;
                let right = img.get_pixel(x + 1, y).0[0] as f64;

                let laplacian = top + bottom + left + right - 4.0 * center;
                sum += laplacian;
                sum_sq += laplacian * laplacian;
                count += 1;
            }
        }

        let mean = sum / count as f64;
        let variance = (sum_sq / count as f64) - (mean * mean);
        Ok(variance.max(0.0))
    }
}

/// Variance of grayscale intensities (RMS contrast squared).
pub struct IntensityVarianceScorer;

impl QualityScorer for IntensityVarianceScorer {
    fn name(&self) -> &'static str {
        "intensity_variance"
    }

    fn score(&self, img: &GrayImage) -> Result<f64, CapabilityUnavailable> {
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut count = 0u64;

        for pixel in img.pixels() {
            let val = pixel.0[0] as f64;
            sum += val;
            sum_sq += val * val;
            count += 1;
        }

        if count == 0 {
            return Err(CapabilityUnavailable::new("intensity_variance", "empty raster"));
        }

        let mean = sum / count as f64;
        let variance = (sum_sq / count as f64) - (mean * mean);
        Ok(variance.max(0.0))
    }
}

/// Derive a quality cutoff from metrics of known-good documents:
/// `max(floor, mean − k·stddev)`. Falls back to `floor` with fewer than two scores.
pub fn calibrate_threshold(scores: &[f64], k: f64, floor: f64) -> f64 {
    match ManualStatistics.summarize(scores) {
        Some(summary) => (summary.mean - k * summary.stddev).max(floor),
        None => floor,
    }
}
