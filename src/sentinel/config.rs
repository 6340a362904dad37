//! Sentinel configuration.
//!
//! Every cutoff the rings use lives here rather than as a hard-coded constant.
//! Defaults carry the calibrated values; deployments override them with a JSON
//! file loaded once at startup.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::RingId;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Per-ring weight in the overall risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingWeights {
    pub contract_match: f64,
    pub statistical_anomaly: f64,
    pub image_quality: f64,
    pub duplicate_hunt: f64,
}

impl Default for RingWeights {
    fn default() -> Self {
        Self {
            contract_match: 0.35,
            statistical_anomaly: 0.25,
            image_quality: 0.15,
            duplicate_hunt: 0.25,
        }
    }
}

impl RingWeights {
    pub fn for_ring(&self, ring: RingId) -> f64 {
        match ring {
            RingId::ContractMatch => self.contract_match,
            RingId::StatisticalAnomaly => self.statistical_anomaly,
            RingId::ImageQuality => self.image_quality,
            RingId::DuplicateHunt => self.duplicate_hunt,
        }
    }
}

/// Ring 1: contract tolerance band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractRingConfig {
    /// Relative deviation accepted without a flag (0.02 = ±2%).
    pub tolerance: f64,
    /// Relative deviation at which severity reaches 1.0.
    pub hard_deviation: f64,
}

impl Default for ContractRingConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.02,
            hard_deviation: 0.25,
        }
    }
}

/// Ring 2: Z-score cutoffs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyRingConfig {
    /// Minimum historical population before a Z-score is trusted.
    pub min_samples: usize,
    /// |z| at which the ring starts flagging (severity 0.5).
    pub flag_z: f64,
    /// |z| at which severity reaches 1.0.
    pub hard_z: f64,
}

impl Default for AnomalyRingConfig {
    fn default() -> Self {
        Self {
            min_samples: 5,
            flag_z: 2.0,
            hard_z: 3.0,
        }
    }
}

/// Ring 3: image quality thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageRingConfig {
    /// Laplacian variance below this = blurry. Blurry documents < 100, sharp text > 500.
    pub min_laplacian_variance: f64,
    /// Intensity variance below this = flat scan (RMS contrast 25, squared).
    pub min_intensity_variance: f64,
    /// Severity floor for any quality flag.
    pub min_flag_severity: f64,
    /// Reject images larger than this before decoding.
    pub max_image_bytes: usize,
    /// Metrics of known-good scans. When present, each scorer's cutoff is
    /// calibrated from them, with the `min_*` values above as floors.
    #[serde(default)]
    pub calibration: Option<QualityCalibration>,
}

impl Default for ImageRingConfig {
    fn default() -> Self {
        Self {
            min_laplacian_variance: 100.0,
            min_intensity_variance: 625.0,
            min_flag_severity: 0.3,
            max_image_bytes: 50 * 1024 * 1024,
            calibration: None,
        }
    }
}

/// Ring 3 calibration set: `cutoff = max(floor, mean − k·stddev)` per scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityCalibration {
    /// Laplacian variance of each known-good document.
    pub laplacian_scores: Vec<f64>,
    /// Intensity variance of each known-good document.
    pub intensity_scores: Vec<f64>,
    pub k: f64,
}

impl Default for QualityCalibration {
    fn default() -> Self {
        Self {
            laplacian_scores: Vec::new(),
            intensity_scores: Vec::new(),
            k: 2.0,
        }
    }
}

/// Ring 4: duplicate similarity cutoffs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateRingConfig {
    /// Candidate window: service date ± this many days.
    pub window_days: u32,
    /// Similarity at or above this is flagged.
    pub similarity_cutoff: f64,
    /// Severity at the cutoff.
    pub min_flag_severity: f64,
    /// Severity just below an exact match.
    pub max_flag_severity: f64,
    /// Perceptual image-hash similarity reported as a corroborating measure.
    pub image_hash_cutoff: f64,
}

impl Default for DuplicateRingConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            similarity_cutoff: 0.85,
            min_flag_severity: 0.6,
            max_flag_severity: 0.95,
            image_hash_cutoff: 0.97,
        }
    }
}

/// Operator switches that force a ring onto its fallback method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityOverrides {
    pub disable_statistics_library: bool,
    pub disable_image_inspection: bool,
    pub disable_edit_distance: bool,
}

/// Full Sentinel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub weights: RingWeights,
    /// Any single verdict at or above this severity rejects the invoice.
    pub reject_severity: f64,
    /// Weighted risk at or above this sends the invoice to review.
    pub review_risk: f64,
    /// Time budget per ring, in milliseconds.
    pub ring_budget_ms: u64,
    pub contract: ContractRingConfig,
    pub anomaly: AnomalyRingConfig,
    pub image: ImageRingConfig,
    pub duplicate: DuplicateRingConfig,
    pub capabilities: CapabilityOverrides,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            weights: RingWeights::default(),
            reject_severity: 0.9,
            review_risk: 0.4,
            ring_budget_ms: 2_000,
            contract: ContractRingConfig::default(),
            anomaly: AnomalyRingConfig::default(),
            image: ImageRingConfig::default(),
            duplicate: DuplicateRingConfig::default(),
            capabilities: CapabilityOverrides::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Loading and validation
// ═══════════════════════════════════════════════════════════

/// Widest duplicate candidate window, in days either side of the service date.
pub const MAX_WINDOW_DAYS: u32 = 366;

impl SentinelConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json(&raw)?;
        tracing::info!(path = %path.display(), "Loaded sentinel config");
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: SentinelConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn ring_budget(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ring_budget_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for ring in RingId::ALL {
            let w = self.weights.for_ring(ring);
            if !w.is_finite() || w < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "weight for {ring} must be a non-negative number, got {w}"
                )));
            }
        }
        unit_interval("reject_severity", self.reject_severity)?;
        unit_interval("review_risk", self.review_risk)?;
        if self.ring_budget_ms == 0 {
            return Err(ConfigError::Invalid("ring_budget_ms must be > 0".into()));
        }

        if self.contract.tolerance < 0.0 || self.contract.hard_deviation <= self.contract.tolerance {
            return Err(ConfigError::Invalid(
                "contract.hard_deviation must exceed contract.tolerance (both >= 0)".into(),
            ));
        }

        if self.anomaly.min_samples < 2 {
            return Err(ConfigError::Invalid(
                "anomaly.min_samples must be at least 2 for a sample stddev".into(),
            ));
        }
        if self.anomaly.flag_z <= 0.0 || self.anomaly.hard_z <= self.anomaly.flag_z {
            return Err(ConfigError::Invalid(
                "anomaly.hard_z must exceed anomaly.flag_z (> 0)".into(),
            ));
        }

        if self.image.min_laplacian_variance <= 0.0 || self.image.min_intensity_variance <= 0.0 {
            return Err(ConfigError::Invalid("image thresholds must be > 0".into()));
        }
        unit_interval("image.min_flag_severity", self.image.min_flag_severity)?;
        if let Some(calibration) = &self.image.calibration {
            if !calibration.k.is_finite() || calibration.k < 0.0 {
                return Err(ConfigError::Invalid(
                    "image.calibration.k must be a non-negative number".into(),
                ));
            }
            let mut scores = calibration.laplacian_scores.iter().chain(&calibration.intensity_scores);
            if scores.any(|v| !v.is_finite() || *v < 0.0) {
                return Err(ConfigError::Invalid(
                    "image.calibration scores must be finite and >= 0".into(),
                ));
            }
        }

        let dup = &self.duplicate;
        if dup.window_days > MAX_WINDOW_DAYS {
            return Err(ConfigError::Invalid(format!(
                "duplicate.window_days must be at most {MAX_WINDOW_DAYS}, got {}",
                dup.window_days
            )));
        }
        unit_interval("duplicate.similarity_cutoff", dup.similarity_cutoff)?;
        unit_interval("duplicate.image_hash_cutoff", dup.image_hash_cutoff)?;
        unit_interval("duplicate.min_flag_severity", dup.min_flag_severity)?;
        unit_interval("duplicate.max_flag_severity", dup.max_flag_severity)?;
        if dup.similarity_cutoff >= 1.0 {
            return Err(ConfigError::Invalid(
                "duplicate.similarity_cutoff must be below 1.0".into(),
            ));
        }
        if dup.max_flag_severity < dup.min_flag_severity {
            return Err(ConfigError::Invalid(
                "duplicate.max_flag_severity must be >= min_flag_severity".into(),
            ));
        }
        Ok(())
    }
}

fn unit_interval(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{field} must be within 0.0..=1.0, got {value}"
        )))
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
