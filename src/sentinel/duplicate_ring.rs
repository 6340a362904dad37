//! Ring 4: fuzzy duplicate hunter.
//!
//! Candidates come from the corpus restricted to the same vendor and a
//! service-date window, so the pairwise comparison never scans the whole corpus.

use std::sync::Arc;

use tracing::{debug, warn};

use super::config::DuplicateRingConfig;
use super::similarity::{SignatureComparer, SimilarityScore};
use super::traits::Ring;
use super::types::{AbstainCause, Evidence, MethodUsed, RingId, RingVerdict};
use crate::models::{DuplicateSignature, InvoiceCandidate};
use crate::reference::{DateWindow, DuplicateCorpus};

pub struct DuplicateRing {
    corpus: Arc<dyn DuplicateCorpus>,
    config: DuplicateRingConfig,
    comparer: SignatureComparer,
}

impl DuplicateRing {
    pub fn new(corpus: Arc<dyn DuplicateCorpus>, config: DuplicateRingConfig, edit_distance: bool) -> Self {
        let comparer = SignatureComparer {
            edit_distance,
            image_hash_cutoff: config.image_hash_cutoff,
        };
        Self {
            corpus,
            config,
            comparer,
        }
    }

    /// `min_flag_severity` at the cutoff, `max_flag_severity` just below an exact match.
    fn severity(&self, similarity: f64) -> f64 {
        let DuplicateRingConfig {
            similarity_cutoff,
            min_flag_severity,
            max_flag_severity,
            ..
        } = self.config;
        let position = (similarity - similarity_cutoff) / (1.0 - similarity_cutoff);
        (min_flag_severity + position * (max_flag_severity - min_flag_severity)).min(max_flag_severity)
    }
}

impl Ring for DuplicateRing {
    fn id(&self) -> RingId {
        RingId::DuplicateHunt
    }

    fn method(&self) -> MethodUsed {
        if self.comparer.edit_distance {
            MethodUsed::preferred("jaccard+levenshtein")
        } else {
            MethodUsed::fallback("jaccard")
        }
    }

    fn inspect(&self, invoice: &InvoiceCandidate) -> RingVerdict {
        let window = DateWindow::around(invoice.service_date, self.config.window_days);
        let candidates = match self.corpus.find_candidates(&invoice.vendor_id, window) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(invoice_id = %invoice.invoice_id, error = %e, "Duplicate corpus lookup failed");
                return RingVerdict::abstain(
                    self.id(),
                    self.method(),
                    AbstainCause::LookupFailure,
                    format!("duplicate corpus lookup failed: {e}"),
                );
            }
        };

        let probe = DuplicateSignature::from_invoice(invoice);
        let best = candidates
            .iter()
            .map(|candidate| (candidate, self.comparer.compare(&probe, candidate)))
            .max_by(|(_, a), (_, b)| a.score.total_cmp(&b.score));

        debug!(
            invoice_id = %invoice.invoice_id,
            candidates = candidates.len(),
            best = best.as_ref().map(|(_, s)| s.score),
            "Duplicate candidates compared"
        );

        let Some((matched, score)) = best else {
            return RingVerdict::pass(
                self.id(),
                self.method(),
                "no prior invoices from this vendor in the date window",
                Evidence::Duplicate {
                    best_match_id: None,
                    similarity: 0.0,
                    jaccard: 0.0,
                    edit_ratio: None,
                    image_similarity: None,
                    measures: Vec::new(),
                    candidates_checked: 0,
                },
            );
        };

        let matched_id = matched.invoice_id.clone();
        let evidence = duplicate_evidence(&matched_id, &score, candidates.len());

        if score.exact {
            RingVerdict::flag(
                self.id(),
                self.method(),
                1.0,
                format!("exact duplicate of {matched_id}"),
                evidence,
            )
        } else if score.score >= self.config.similarity_cutoff {
            RingVerdict::flag(
                self.id(),
                self.method(),
                self.severity(score.score),
                format!("{:.0}% similar to {matched_id}", score.score * 100.0),
                evidence,
            )
        } else {
            RingVerdict::pass(
                self.id(),
                self.method(),
                format!(
                    "closest of {} candidates is {:.0}% similar",
                    candidates.len(),
                    score.score * 100.0
                ),
                evidence,
            )
        }
    }
}

fn duplicate_evidence(matched_id: &str, score: &SimilarityScore, candidates_checked: usize) -> Evidence {
    Evidence::Duplicate {
        best_match_id: Some(matched_id.to_string()),
        similarity: score.score,
        jaccard: score.jaccard,
        edit_ratio: score.edit_ratio,
        image_similarity: score.image_similarity,
        measures: score.measures.clone(),
        candidates_checked,
    }
}
