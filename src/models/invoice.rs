use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Lane;
use crate::sentinel::error::InputError;
use crate::sentinel::types::DecisionWarning;

/// Unit the billing quantity is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingUnit {
    PerTrip,
    PerKg,
    PerTonne,
    PerKm,
    PerPallet,
}

impl BillingUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerTrip => "per_trip",
            Self::PerKg => "per_kg",
            Self::PerTonne => "per_tonne",
            Self::PerKm => "per_km",
            Self::PerPallet => "per_pallet",
        }
    }
}

/// Weight or unit count the invoice is billed on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BillingBasis {
    pub quantity: f64,
    pub unit: BillingUnit,
}

impl BillingBasis {
    pub fn per_trip() -> Self {
        Self {
            quantity: 1.0,
            unit: BillingUnit::PerTrip,
        }
    }
}

/// Raster of the scanned invoice, as encoded bytes (PNG, JPEG, TIFF).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentImage {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
}

impl DocumentImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            file_name: None,
            bytes,
        }
    }
}

/// The unit under audit. Produced upstream by extraction; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceCandidate {
    pub invoice_id: String,
    pub vendor_id: String,
    pub origin: String,
    pub destination: String,
    pub service_type: String,
    pub declared_amount: f64,
    pub billing_basis: BillingBasis,
    pub service_date: NaiveDate,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub document_image: Option<DocumentImage>,
    pub submitted_at: DateTime<Utc>,
}

impl InvoiceCandidate {
    pub fn lane(&self) -> Lane {
        Lane::new(&self.origin, &self.destination)
    }

    /// Declared amount per billing unit. `None` when the quantity is zero.
    pub fn unit_rate(&self) -> Option<f64> {
        let quantity = self.billing_basis.quantity;
        if quantity > 0.0 && quantity.is_finite() {
            Some(self.declared_amount / quantity)
        } else {
            None
        }
    }

    /// Structural validation run before any ring.
    ///
    /// Hard failures return `InputError`; soft problems come back as warnings
    /// to be carried on the decision.
    pub fn validate(&self) -> Result<Vec<DecisionWarning>, InputError> {
        if self.invoice_id.trim().is_empty() {
            return Err(InputError::MissingInvoiceId);
        }
        if self.vendor_id.trim().is_empty() {
            return Err(InputError::MissingVendor);
        }
        if self.origin.trim().is_empty() {
            return Err(InputError::MissingLaneEnd("origin"));
        }
        if self.destination.trim().is_empty() {
            return Err(InputError::MissingLaneEnd("destination"));
        }
        if !self.declared_amount.is_finite() || self.declared_amount < 0.0 {
            return Err(InputError::InvalidAmount(self.declared_amount));
        }
        let quantity = self.billing_basis.quantity;
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(InputError::InvalidBillingQuantity(quantity));
        }
        let lane = self.lane();
        if lane.is_round_trip() {
            return Err(InputError::SameOriginDestination(lane.origin));
        }

        let mut warnings = Vec::new();
        if self.submitted_at.date_naive() < self.service_date {
            warnings.push(DecisionWarning::SubmittedBeforeService {
                submitted_at: self.submitted_at,
                service_date: self.service_date,
            });
        }
        Ok(warnings)
    }
}

/// Serde adapter: document bytes travel as standard base64 in JSON.
mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
