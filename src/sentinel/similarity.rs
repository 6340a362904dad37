//! Pairwise similarity between duplicate signatures (Ring 4).
//!
//! Token-set Jaccard is always computed. With the edit-distance capability the
//! score becomes the mean of Jaccard and a normalized Levenshtein ratio over
//! the signature text. The perceptual image hash is corroborating evidence:
//! it is reported, but the score is decided by the text signature alone.
//! One vendor's invoices share a print template, so scans of different
//! invoices hash alike.

use std::collections::HashSet;

use super::types::SimilarityMeasure;
use crate::models::{hash_similarity, DuplicateSignature};

/// Scores at or above this count as identical.
const EXACT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityScore {
    pub score: f64,
    pub jaccard: f64,
    pub edit_ratio: Option<f64>,
    pub image_similarity: Option<f64>,
    pub exact: bool,
    pub measures: Vec<SimilarityMeasure>,
}

/// Jaccard similarity coefficient between two token sets.
#[allow(clippy::cast_precision_loss)]
pub fn jaccard(set1: &HashSet<String>, set2: &HashSet<String>) -> f64 {
    if set1.is_empty() && set2.is_empty() {
        return 1.0;
    }
    if set1.is_empty() || set2.is_empty() {
        return 0.0;
    }

    let intersection = set1.intersection(set2).count();
    let union = set1.union(set2).count();
    intersection as f64 / union as f64
}

/// Normalized Levenshtein ratio (1.0 = identical strings).
#[cfg(feature = "edit-distance")]
pub fn edit_ratio(a: &str, b: &str) -> Option<f64> {
    Some(strsim::normalized_levenshtein(a, b))
}

#[cfg(not(feature = "edit-distance"))]
pub fn edit_ratio(_a: &str, _b: &str) -> Option<f64> {
    None
}

/// Compares a probe signature against candidates with a fixed set of measures.
#[derive(Debug, Clone, Copy)]
pub struct SignatureComparer {
    pub edit_distance: bool,
    pub image_hash_cutoff: f64,
}

impl SignatureComparer {
    pub fn compare(&self, probe: &DuplicateSignature, candidate: &DuplicateSignature) -> SimilarityScore {
        let mut measures = vec![SimilarityMeasure::TokenJaccard];
        let jaccard = jaccard(&probe.tokens(), &candidate.tokens());

        let edit_ratio = if self.edit_distance {
            edit_ratio(&probe.text(), &candidate.text())
        } else {
            None
        };
        let mut score = match edit_ratio {
            Some(ratio) => {
                measures.push(SimilarityMeasure::EditDistanceRatio);
                (jaccard + ratio) / 2.0
            }
            None => jaccard,
        };

        let fingerprint_match = probe.fingerprint == candidate.fingerprint;
        if fingerprint_match {
            measures.insert(0, SimilarityMeasure::Fingerprint);
            score = 1.0;
        }

        let image_similarity = match (&probe.image_hash, &candidate.image_hash) {
            (Some(a), Some(b)) => hash_similarity(a, b),
            _ => None,
        };
        if image_similarity.is_some_and(|sim| sim >= self.image_hash_cutoff) {
            measures.push(SimilarityMeasure::ImagePerceptualHash);
        }

        let exact = fingerprint_match || score >= 1.0 - EXACT_EPSILON;
        SimilarityScore {
            score: if exact { 1.0 } else { score },
            jaccard,
            edit_ratio,
            image_similarity,
            exact,
            measures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn signature(id: &str, amount: f64, remarks: &str) -> DuplicateSignature {
        let text = format!("acme|{amount:.2}|mumbai>pune|{remarks}");
        DuplicateSignature {
            invoice_id: id.into(),
            vendor_id: "acme".into(),
            amount,
            service_date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            route: "mumbai>pune".into(),
            remarks: remarks.into(),
            fingerprint: text,
            image_hash: None,
        }
    }

    fn two_tone_png() -> Vec<u8> {
        let img = image::RgbImage::from_fn(32, 32, |x, _| {
            if x < 16 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        });
        let mut cursor = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, image::ImageOutputFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    fn set(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn jaccard_basics() {
        assert_eq!(jaccard(&set(&["a", "b"]), &set(&["a", "b"])), 1.0);
        assert_eq!(jaccard(&set(&["a"]), &set(&["b"])), 0.0);
        assert!((jaccard(&set(&["a", "b", "c"]), &set(&["a", "b", "d"])) - 0.5).abs() < 1e-12);
        assert_eq!(jaccard(&set(&[]), &set(&["a"])), 0.0);
    }

    #[test]
    fn identical_fingerprints_are_exact() {
        let comparer = SignatureComparer {
            edit_distance: false,
            image_hash_cutoff: 0.97,
        };
        let a = signature("A", 100.0, "ftl delivered");
        let b = signature("B", 100.0, "ftl delivered");
        let s = comparer.compare(&a, &b);
        assert!(s.exact);
        assert_eq!(s.score, 1.0);
        assert_eq!(s.measures[0], SimilarityMeasure::Fingerprint);
    }

    #[test]
    fn different_amount_lowers_score() {
        let comparer = SignatureComparer {
            edit_distance: false,
            image_hash_cutoff: 0.97,
        };
        let a = signature("A", 100.0, "ftl delivered");
        let b = signature("B", 250.0, "ftl delivered");
        let s = comparer.compare(&a, &b);
        assert!(!s.exact);
        // 5 shared of 7 distinct tokens
        assert!((s.jaccard - 5.0 / 7.0).abs() < 1e-12);
        assert_eq!(s.edit_ratio, None);
        assert_eq!(s.measures, vec![SimilarityMeasure::TokenJaccard]);
    }

    #[cfg(feature = "edit-distance")]
    #[test]
    fn edit_ratio_refines_score() {
        let comparer = SignatureComparer {
            edit_distance: true,
            image_hash_cutoff: 0.97,
        };
        let a = signature("A", 100.0, "ftl delivered gate pass 4411");
        let b = signature("B", 100.0, "ftl delivered gate pass 4412");
        let s = comparer.compare(&a, &b);
        let ratio = s.edit_ratio.unwrap();
        assert!(ratio > 0.9);
        assert!((s.score - (s.jaccard + ratio) / 2.0).abs() < 1e-12);
        assert!(s.measures.contains(&SimilarityMeasure::EditDistanceRatio));
    }

    #[test]
    fn shared_template_scan_does_not_make_a_duplicate() {
        let comparer = SignatureComparer {
            edit_distance: true,
            image_hash_cutoff: 0.97,
        };
        let mut a = signature("A", 4_200.0, "two pallets electronics");
        let mut b = signature("B", 18_750.0, "full truck steel coils");
        let hash = crate::models::perceptual_hash(&two_tone_png()).unwrap();
        a.image_hash = Some(hash.clone());
        b.image_hash = Some(hash);
        let s = comparer.compare(&a, &b);
        assert_eq!(s.image_similarity, Some(1.0));
        assert!(s.measures.contains(&SimilarityMeasure::ImagePerceptualHash));
        assert!(!s.exact);
        assert!(s.score < 0.85, "score {}", s.score);
    }

    #[test]
    fn image_hash_leaves_text_score_untouched() {
        let comparer = SignatureComparer {
            edit_distance: false,
            image_hash_cutoff: 0.97,
        };
        let plain = comparer.compare(
            &signature("A", 100.0, "ftl delivered"),
            &signature("B", 250.0, "ftl delivered"),
        );
        let mut a = signature("A", 100.0, "ftl delivered");
        let mut b = signature("B", 250.0, "ftl delivered");
        let hash = crate::models::perceptual_hash(&two_tone_png()).unwrap();
        a.image_hash = Some(hash.clone());
        b.image_hash = Some(hash);
        let with_image = comparer.compare(&a, &b);
        assert_eq!(with_image.score.to_bits(), plain.score.to_bits());
        assert_eq!(with_image.exact, plain.exact);
    }
}
