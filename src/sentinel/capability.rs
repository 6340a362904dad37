//! Startup capability resolution.
//!
//! Each optional capability is resolved exactly once, when the Sentinel is
//! built: compiled in (Cargo feature), not switched off by config, and for
//! image inspection a probe of the Laplacian scorer on a synthetic raster.
//! Rings are then bound to the preferred or fallback method for their lifetime.

use image::{GrayImage, Luma};
use serde::Serialize;

use super::config::CapabilityOverrides;
use super::quality::LaplacianScorer;
use super::traits::QualityScorer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Ring 2 can use the ndarray backend.
    pub statistics_library: bool,
    /// Ring 3 can use Laplacian-variance inspection.
    pub image_inspection: bool,
    /// Ring 4 can refine Jaccard with a normalized edit-distance ratio.
    pub edit_distance: bool,
}

impl Capabilities {
    pub fn resolve(overrides: &CapabilityOverrides) -> Self {
        let statistics_library =
            cfg!(feature = "ndarray-stats") && !overrides.disable_statistics_library;
        let image_inspection = !overrides.disable_image_inspection && probe_image_inspection();
        let edit_distance = cfg!(feature = "edit-distance") && !overrides.disable_edit_distance;

        let caps = Self {
            statistics_library,
            image_inspection,
            edit_distance,
        };
        tracing::info!(
            statistics_library = caps.statistics_library,
            image_inspection = caps.image_inspection,
            edit_distance = caps.edit_distance,
            "Sentinel capabilities resolved"
        );
        caps
    }
}

/// Run the Laplacian scorer on an 8x8 checkerboard. A working scorer must
/// report a strictly positive, finite variance.
fn probe_image_inspection() -> bool {
    let probe = GrayImage::from_fn(8, 8, |x, y| {
        if (x + y) % 2 == 0 {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });
    match LaplacianScorer.score(&probe) {
        Ok(v) if v.is_finite() && v > 0.0 => true,
        Ok(v) => {
            tracing::warn!(variance = v, "Image inspection probe returned a degenerate score");
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, "Image inspection probe failed");
            false
        }
    }
}
