//! Verdict aggregation.
//!
//! risk = Σ wᵢ·sᵢ / Σ wᵢ over contributing (non-ABSTAIN) verdicts.
//! REJECT if any verdict reaches `reject_severity`, else REVIEW if risk
//! reaches `review_risk`, else CLEAR. Summation runs in canonical ring order
//! so the result does not depend on completion order.

use super::config::SentinelConfig;
use super::types::{DecisionStatus, RingVerdict};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    pub status: DecisionStatus,
    pub risk_score: f64,
}

pub fn aggregate(verdicts: &[RingVerdict], config: &SentinelConfig) -> Aggregate {
    let mut contributing: Vec<&RingVerdict> = verdicts.iter().filter(|v| v.contributes()).collect();
    contributing.sort_by_key(|v| v.ring);

    let (weighted, total_weight) = contributing.iter().fold((0.0f64, 0.0f64), |(sum, total), v| {
        let w = config.weights.for_ring(v.ring);
        (sum + w * v.severity, total + w)
    });
    let risk_score = if total_weight > 0.0 {
        weighted / total_weight
    } else {
        0.0
    };

    let status = if contributing.iter().any(|v| v.severity >= config.reject_severity) {
        DecisionStatus::Reject
    } else if risk_score >= config.review_risk {
        DecisionStatus::Review
    } else {
        DecisionStatus::Clear
    };

    Aggregate { status, risk_score }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentinel::types::{AbstainCause, Evidence, MethodUsed, RingId};

    fn flag(ring: RingId, severity: f64) -> RingVerdict {
        RingVerdict::flag(ring, MethodUsed::preferred("test"), severity, "flag", Evidence::None)
    }

    fn pass(ring: RingId) -> RingVerdict {
        RingVerdict::pass(ring, MethodUsed::preferred("test"), "ok", Evidence::None)
    }

    fn abstain(ring: RingId) -> RingVerdict {
        RingVerdict::abstain(ring, MethodUsed::preferred("test"), AbstainCause::NotApplicable, "n/a")
    }

    #[test]
    fn all_pass_is_clear() {
        let verdicts: Vec<_> = RingId::ALL.iter().map(|r| pass(*r)).collect();
        let agg = aggregate(&verdicts, &SentinelConfig::default());
        assert_eq!(agg.status, DecisionStatus::Clear);
        assert_eq!(agg.risk_score, 0.0);
    }

    #[test]
    fn single_hard_flag_rejects() {
        let verdicts = vec![
            pass(RingId::ContractMatch),
            pass(RingId::StatisticalAnomaly),
            pass(RingId::ImageQuality),
            flag(RingId::DuplicateHunt, 1.0),
        ];
        let agg = aggregate(&verdicts, &SentinelConfig::default());
        assert_eq!(agg.status, DecisionStatus::Reject);
        assert!((agg.risk_score - 0.25).abs() < 1e-12);
    }

    #[test]
    fn weighted_risk_triggers_review() {
        // (0.35*0.8 + 0.25*0.6) / 0.6 ≈ 0.717, nothing >= 0.9
        let verdicts = vec![
            flag(RingId::ContractMatch, 0.8),
            flag(RingId::StatisticalAnomaly, 0.6),
            abstain(RingId::ImageQuality),
            abstain(RingId::DuplicateHunt),
        ];
        let agg = aggregate(&verdicts, &SentinelConfig::default());
        assert_eq!(agg.status, DecisionStatus::Review);
        assert!((agg.risk_score - (0.35 * 0.8 + 0.25 * 0.6) / 0.6).abs() < 1e-12);
    }

    #[test]
    fn abstentions_do_not_dilute() {
        let verdicts = vec![flag(RingId::ContractMatch, 0.5), abstain(RingId::DuplicateHunt)];
        let agg = aggregate(&verdicts, &SentinelConfig::default());
        assert!((agg.risk_score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn all_abstain_is_zero_risk() {
        let verdicts: Vec<_> = RingId::ALL.iter().map(|r| abstain(*r)).collect();
        let agg = aggregate(&verdicts, &SentinelConfig::default());
        assert_eq!(agg.risk_score, 0.0);
        assert_eq!(agg.status, DecisionStatus::Clear);
    }

    #[test]
    fn order_independent() {
        let verdicts = vec![
            flag(RingId::ContractMatch, 0.37),
            flag(RingId::StatisticalAnomaly, 0.71),
            flag(RingId::ImageQuality, 0.13),
            flag(RingId::DuplicateHunt, 0.66),
        ];
        let expected = aggregate(&verdicts, &SentinelConfig::default());

        let permutations = [[3, 2, 1, 0], [1, 3, 0, 2], [2, 0, 3, 1], [0, 2, 1, 3]];
        for order in permutations {
            let shuffled: Vec<_> = order.iter().map(|&i| verdicts[i].clone()).collect();
            let agg = aggregate(&shuffled, &SentinelConfig::default());
            assert_eq!(agg.status, expected.status);
            assert_eq!(agg.risk_score.to_bits(), expected.risk_score.to_bits());
        }
    }
}
