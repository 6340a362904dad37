//! Duplicate signatures: the comparable form of an audited invoice.
//!
//! A signature is derived once per invoice, never mutated, and indexed by
//! vendor + service date so candidate retrieval stays inside a date window.

use std::collections::HashSet;
use std::sync::LazyLock;

use base64::Engine;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{normalize_key, InvoiceCandidate};

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateSignature {
    pub invoice_id: String,
    /// Normalized vendor key (index column).
    pub vendor_id: String,
    /// Declared amount rounded to two decimals.
    pub amount: f64,
    /// Date bucket (index column).
    pub service_date: NaiveDate,
    /// `origin>destination`, slugged.
    pub route: String,
    /// Remarks reduced to lowercase alphanumeric words.
    pub remarks: String,
    /// SHA-256 (base64) of `text()`. Equal fingerprints = identical signature.
    pub fingerprint: String,
    /// Perceptual hash of the document image, when one was attached and decodable.
    #[serde(default)]
    pub image_hash: Option<String>,
}

impl DuplicateSignature {
    pub fn from_invoice(invoice: &InvoiceCandidate) -> Self {
        let vendor_id = normalize_key(&invoice.vendor_id);
        let amount = round_amount(invoice.declared_amount);
        let route = format!("{}>{}", slug(&invoice.origin), slug(&invoice.destination));
        let remarks = normalize_text(&invoice.remarks);
        let fingerprint = fingerprint(&signature_text(&vendor_id, amount, &route, &remarks));
        let image_hash = invoice
            .document_image
            .as_ref()
            .and_then(|doc| perceptual_hash(&doc.bytes));

        Self {
            invoice_id: invoice.invoice_id.clone(),
            vendor_id,
            amount,
            service_date: invoice.service_date,
            route,
            remarks,
            fingerprint,
            image_hash,
        }
    }

    /// Normalized text signature: vendor | amount | route | remarks.
    pub fn text(&self) -> String {
        signature_text(&self.vendor_id, self.amount, &self.route, &self.remarks)
    }

    /// Token set for Jaccard comparison.
    pub fn tokens(&self) -> HashSet<String> {
        let mut tokens = HashSet::new();
        tokens.insert(format!("vendor:{}", slug(&self.vendor_id)));
        tokens.insert(format!("amount:{:.2}", self.amount));
        let (origin, destination) = self.route.split_once('>').unwrap_or((&self.route, ""));
        tokens.insert(format!("from:{origin}"));
        tokens.insert(format!("to:{destination}"));
        tokens.extend(self.remarks.split_whitespace().map(String::from));
        tokens
    }
}

fn signature_text(vendor_id: &str, amount: f64, route: &str, remarks: &str) -> String {
    format!("{}|{amount:.2}|{route}|{remarks}", slug(vendor_id))
}

pub fn round_amount(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Lowercase alphanumeric words separated by single spaces.
pub fn normalize_text(raw: &str) -> String {
    let lower = raw.to_lowercase();
    NON_ALNUM
        .split(&lower)
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn slug(raw: &str) -> String {
    normalize_text(raw).replace(' ', "_")
}

fn fingerprint(text: &str) -> String {
    let hash = Sha256::digest(text.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hash)
}

/// Perceptual hash of an encoded image.
/// Uses DoubleGradient algorithm (256-bit hash) for near-duplicate detection.
pub fn perceptual_hash(bytes: &[u8]) -> Option<String> {
    let img = match img_hash::image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::debug!(error = %e, "Document image not hashable, skipping perceptual hash");
            return None;
        }
    };

    let hasher = img_hash::HasherConfig::new()
        .hash_alg(img_hash::HashAlg::DoubleGradient)
        .hash_size(16, 16)
        .to_hasher();

    Some(hasher.hash_image(&img).to_base64())
}

/// Compare two perceptual hashes and return similarity score (0.0-1.0)
pub fn hash_similarity(hash_a: &str, hash_b: &str) -> Option<f64> {
    let a = img_hash::ImageHash::<Vec<u8>>::from_base64(hash_a).ok()?;
    let b = img_hash::ImageHash::<Vec<u8>>::from_base64(hash_b).ok()?;

    let distance = a.dist(&b);
    let max_bits = (a.as_bytes().len() * 8).max(1) as f64;
    Some(1.0 - (distance as f64 / max_bits))
}
