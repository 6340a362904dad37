//! Ring 3: document image quality inspector ("digital twin" check).
//!
//! A blurred or washed-out scan is a common sign of a re-scanned or edited
//! document. The ring decodes the attached raster, scores it, and flags
//! anything under the scorer's threshold. Lower metric = higher severity.

use tracing::{debug, info};

use super::config::ImageRingConfig;
use super::quality::{calibrate_threshold, decode_document, IntensityVarianceScorer, LaplacianScorer};
use super::traits::{QualityScorer, Ring};
use super::types::{AbstainCause, Evidence, MethodUsed, RingId, RingVerdict};
use crate::models::InvoiceCandidate;

/// A scorer together with the cutoff its metric is judged against.
struct BoundScorer {
    scorer: Box<dyn QualityScorer>,
    threshold: f64,
}

pub struct ImageRing {
    config: ImageRingConfig,
    /// `None` when image inspection is unavailable; the fallback runs alone.
    primary: Option<BoundScorer>,
    fallback: BoundScorer,
}

impl ImageRing {
    pub fn new(config: ImageRingConfig, image_inspection: bool) -> Self {
        let (laplacian_threshold, intensity_threshold) = match &config.calibration {
            Some(calibration) => {
                let laplacian = calibrate_threshold(
                    &calibration.laplacian_scores,
                    calibration.k,
                    config.min_laplacian_variance,
                );
                let intensity = calibrate_threshold(
                    &calibration.intensity_scores,
                    calibration.k,
                    config.min_intensity_variance,
                );
                info!(
                    laplacian_threshold = laplacian,
                    intensity_threshold = intensity,
                    known_good = calibration.laplacian_scores.len(),
                    "Image quality thresholds calibrated"
                );
                (laplacian, intensity)
            }
            None => (config.min_laplacian_variance, config.min_intensity_variance),
        };
        let primary = image_inspection.then(|| BoundScorer {
            scorer: Box::new(LaplacianScorer),
            threshold: laplacian_threshold,
        });
        let fallback = BoundScorer {
            scorer: Box::new(IntensityVarianceScorer),
            threshold: intensity_threshold,
        };
        Self {
            config,
            primary,
            fallback,
        }
    }

    fn severity(&self, metric: f64, threshold: f64) -> f64 {
        ((threshold - metric) / threshold)
            .max(self.config.min_flag_severity)
            .min(1.0)
    }
}

impl Ring for ImageRing {
    fn id(&self) -> RingId {
        RingId::ImageQuality
    }

    fn method(&self) -> MethodUsed {
        match &self.primary {
            Some(bound) => MethodUsed::preferred(bound.scorer.name()),
            None => MethodUsed::fallback(self.fallback.scorer.name()),
        }
    }

    fn inspect(&self, invoice: &InvoiceCandidate) -> RingVerdict {
        let Some(document) = &invoice.document_image else {
            return RingVerdict::abstain(
                self.id(),
                self.method(),
                AbstainCause::NoDocument,
                "no document image attached",
            );
        };

        let raster = match decode_document(&document.bytes, self.config.max_image_bytes) {
            Ok(raster) => raster,
            Err(e) => {
                debug!(invoice_id = %invoice.invoice_id, error = %e, "Document image unreadable");
                return RingVerdict::abstain(
                    self.id(),
                    self.method(),
                    AbstainCause::LookupFailure,
                    format!("document image unreadable: {e}"),
                );
            }
        };

        // Preferred scorer first; a per-call refusal drops to the fallback
        let mut scored = None;
        if let Some(primary) = &self.primary {
            match primary.scorer.score(&raster) {
                Ok(metric) => {
                    scored = Some((metric, primary.threshold, MethodUsed::preferred(primary.scorer.name())))
                }
                Err(e) => {
                    debug!(invoice_id = %invoice.invoice_id, error = %e, "Preferred image scorer refused, using fallback");
                }
            }
        }
        let (metric, threshold, method) = match scored {
            Some(scored) => scored,
            None => match self.fallback.scorer.score(&raster) {
                Ok(metric) => (
                    metric,
                    self.fallback.threshold,
                    MethodUsed::fallback(self.fallback.scorer.name()),
                ),
                Err(e) => {
                    return RingVerdict::abstain(
                        self.id(),
                        self.method(),
                        AbstainCause::CapabilityUnavailable,
                        e.to_string(),
                    );
                }
            },
        };

        let evidence = Evidence::ImageQuality {
            metric,
            threshold,
            degraded: method.is_degraded(),
        };

        if metric < threshold {
            let severity = self.severity(metric, threshold);
            RingVerdict::flag(
                self.id(),
                method,
                severity,
                format!("low quality / possible re-scan or tamper ({metric:.1} < {threshold:.1})"),
                evidence,
            )
        } else {
            RingVerdict::pass(
                self.id(),
                method,
                format!("document quality {metric:.1} meets threshold {threshold:.1}"),
                evidence,
            )
        }
    }
}
