//! Error taxonomy for the Sentinel.
//!
//! Only `InputError` ever reaches the caller of `Sentinel::audit`. Every other
//! condition degrades into an ABSTAIN verdict inside the ring that hit it.

use thiserror::Error;

use super::config::ConfigError;

/// Structural problems with an invoice candidate. Rejected before any ring runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("Invoice is missing a vendor identifier")]
    MissingVendor,

    #[error("Invoice is missing an invoice identifier")]
    MissingInvoiceId,

    #[error("Invoice is missing {0}")]
    MissingLaneEnd(&'static str),

    #[error("Declared amount must be a non-negative number, got {0}")]
    InvalidAmount(f64),

    #[error("Billing quantity must be a non-negative number, got {0}")]
    InvalidBillingQuantity(f64),

    #[error("Origin and destination are the same: {0}")]
    SameOriginDestination(String),
}

/// An optional capability (library, scorer) cannot serve this request.
/// Triggers the ring's documented fallback and never surfaces to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Capability '{capability}' unavailable: {reason}")]
pub struct CapabilityUnavailable {
    pub capability: &'static str,
    pub reason: String,
}

impl CapabilityUnavailable {
    pub fn new(capability: &'static str, reason: impl Into<String>) -> Self {
        Self {
            capability,
            reason: reason.into(),
        }
    }
}

/// A document image that could not be turned into a raster.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentImageError {
    #[error("Image data too small to be valid")]
    TooSmall,

    #[error("Image data exceeds {limit_mb}MB limit")]
    TooLarge { limit_mb: usize },

    #[error("Failed to decode image: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("Invalid invoice: {0}")]
    Input(#[from] InputError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Audit runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}
