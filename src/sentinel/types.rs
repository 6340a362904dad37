use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ═══════════════════════════════════════════
// Ring identity
// ═══════════════════════════════════════════

/// The four validation rings. Declaration order is the canonical verdict order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RingId {
    ContractMatch,
    StatisticalAnomaly,
    ImageQuality,
    DuplicateHunt,
}

impl RingId {
    pub const ALL: [RingId; 4] = [
        RingId::ContractMatch,
        RingId::StatisticalAnomaly,
        RingId::ImageQuality,
        RingId::DuplicateHunt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContractMatch => "contract_match",
            Self::StatisticalAnomaly => "statistical_anomaly",
            Self::ImageQuality => "image_quality",
            Self::DuplicateHunt => "duplicate_hunt",
        }
    }
}

impl std::fmt::Display for RingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Method binding
// ═══════════════════════════════════════════

/// Whether a ring ran its preferred algorithm or a degraded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodTier {
    Preferred,
    Fallback,
}

/// The algorithm a ring used (or is bound to use).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodUsed {
    pub name: String,
    pub tier: MethodTier,
}

impl MethodUsed {
    pub fn preferred(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tier: MethodTier::Preferred,
        }
    }

    pub fn fallback(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tier: MethodTier::Fallback,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.tier == MethodTier::Fallback
    }
}

impl std::fmt::Display for MethodUsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.tier {
            MethodTier::Preferred => write!(f, "{}", self.name),
            MethodTier::Fallback => write!(f, "{} (fallback)", self.name),
        }
    }
}

/// Which method a ring was bound to at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RingBinding {
    pub ring: RingId,
    pub method: MethodUsed,
}

// ═══════════════════════════════════════════
// Ring verdict
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Pass,
    Flag,
    Abstain,
}

/// Why a ring declined to assert anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstainCause {
    /// The ring does not apply (e.g. spot rate with no contract).
    NotApplicable,
    /// Not enough reference data for a meaningful result.
    InsufficientData,
    /// No document image attached.
    NoDocument,
    /// A reference lookup failed or the input could not be read.
    LookupFailure,
    /// The ring exceeded its time budget.
    Timeout,
    /// Neither the preferred nor a fallback method could run.
    CapabilityUnavailable,
    /// The ring task itself failed.
    RingFailure,
}

/// Which similarity measures contributed to a duplicate score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMeasure {
    Fingerprint,
    TokenJaccard,
    EditDistanceRatio,
    ImagePerceptualHash,
}

/// What a ring looked at to reach its verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    None,
    Contract {
        contract_id: String,
        expected_amount: f64,
        declared_amount: f64,
        deviation: f64,
    },
    Statistical {
        unit_rate: f64,
        mean: f64,
        stddev: f64,
        z_score: f64,
        sample_size: usize,
    },
    ImageQuality {
        metric: f64,
        threshold: f64,
        degraded: bool,
    },
    Duplicate {
        best_match_id: Option<String>,
        similarity: f64,
        jaccard: f64,
        edit_ratio: Option<f64>,
        image_similarity: Option<f64>,
        measures: Vec<SimilarityMeasure>,
        candidates_checked: usize,
    },
    Failure {
        reason: String,
    },
}

/// Output of one ring for one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingVerdict {
    pub ring: RingId,
    pub status: VerdictStatus,
    /// 0.0 - 1.0. Always 0.0 for PASS and ABSTAIN.
    pub severity: f64,
    pub reason: String,
    pub evidence: Evidence,
    pub method: MethodUsed,
    pub abstain_cause: Option<AbstainCause>,
}

impl RingVerdict {
    pub fn pass(ring: RingId, method: MethodUsed, reason: impl Into<String>, evidence: Evidence) -> Self {
        Self {
            ring,
            status: VerdictStatus::Pass,
            severity: 0.0,
            reason: reason.into(),
            evidence,
            method,
            abstain_cause: None,
        }
    }

    pub fn flag(
        ring: RingId,
        method: MethodUsed,
        severity: f64,
        reason: impl Into<String>,
        evidence: Evidence,
    ) -> Self {
        let severity = if severity.is_nan() { 1.0 } else { severity.clamp(0.0, 1.0) };
        Self {
            ring,
            status: VerdictStatus::Flag,
            severity,
            reason: reason.into(),
            evidence,
            method,
            abstain_cause: None,
        }
    }

    pub fn abstain(
        ring: RingId,
        method: MethodUsed,
        cause: AbstainCause,
        reason: impl Into<String>,
    ) -> Self {
        let reason = reason.into();
        let evidence = match cause {
            AbstainCause::LookupFailure
            | AbstainCause::Timeout
            | AbstainCause::RingFailure
            | AbstainCause::CapabilityUnavailable => Evidence::Failure {
                reason: reason.clone(),
            },
            _ => Evidence::None,
        };
        Self {
            ring,
            status: VerdictStatus::Abstain,
            severity: 0.0,
            reason,
            evidence,
            method,
            abstain_cause: Some(cause),
        }
    }

    /// ABSTAIN verdicts never contribute to aggregation.
    pub fn contributes(&self) -> bool {
        self.status != VerdictStatus::Abstain
    }
}

// ═══════════════════════════════════════════
// Audit decision
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Clear,
    Review,
    Reject,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Review => "review",
            Self::Reject => "reject",
        }
    }
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Soft problems with the invoice that do not block the audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionWarning {
    SubmittedBeforeService {
        submitted_at: DateTime<Utc>,
        service_date: NaiveDate,
    },
}

/// Aggregated result of one audit call. Persistence is the caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditDecision {
    pub audit_id: Uuid,
    pub invoice_id: String,
    pub status: DecisionStatus,
    pub risk_score: f64,
    /// One verdict per ring, in `RingId` order.
    pub verdicts: Vec<RingVerdict>,
    pub warnings: Vec<DecisionWarning>,
    pub decided_at: DateTime<Utc>,
}

impl AuditDecision {
    pub fn verdict(&self, ring: RingId) -> Option<&RingVerdict> {
        self.verdicts.iter().find(|v| v.ring == ring)
    }

    pub fn abstentions(&self) -> impl Iterator<Item = &RingVerdict> {
        self.verdicts.iter().filter(|v| !v.contributes())
    }

    pub fn degraded_rings(&self) -> impl Iterator<Item = &RingVerdict> {
        self.verdicts.iter().filter(|v| v.method.is_degraded())
    }
}
