//! Trait definitions for the Sentinel.
//!
//! Three traits define the seams:
//! - Ring: one independent validation check
//! - StatisticsBackend: how Ring 2 summarizes a rate population
//! - QualityScorer: how Ring 3 turns a raster into a quality metric

use image::GrayImage;

use super::error::CapabilityUnavailable;
use super::stats::Summary;
use super::types::{MethodUsed, RingId, RingVerdict};
use crate::models::InvoiceCandidate;

/// One validation ring. Implementations only read the invoice and their
/// reference component; they never mutate either.
pub trait Ring: Send + Sync {
    fn id(&self) -> RingId;

    /// The method this ring was bound to at construction.
    fn method(&self) -> MethodUsed;

    /// Inspect the invoice. Never fails: problems become ABSTAIN verdicts.
    fn inspect(&self, invoice: &InvoiceCandidate) -> RingVerdict;
}

/// Mean / sample standard deviation over a rate population.
pub trait StatisticsBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` when fewer than two finite values are supplied.
    fn summarize(&self, values: &[f64]) -> Option<Summary>;
}

/// Computes a sharpness/quality metric from a grayscale raster.
/// Higher = better quality.
pub trait QualityScorer: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, image: &GrayImage) -> Result<f64, CapabilityUnavailable>;
}
