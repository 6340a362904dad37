//! Sentinel: the pre-audit validation pipeline.
//!
//! Four independent rings inspect each invoice:
//! 1. Contract matcher: declared amount vs. active contract
//! 2. Statistical anomaly: unit-rate Z-score vs. lane history
//! 3. Image quality: sharpness of the scanned document
//! 4. Duplicate hunter: similarity to recent invoices from the same vendor
//!
//! The orchestrator runs them concurrently and folds their verdicts into an
//! advisory `AuditDecision`.

pub mod aggregate;
pub mod anomaly_ring;
pub mod capability;
pub mod config;
pub mod contract_ring;
pub mod duplicate_ring;
pub mod error;
pub mod image_ring;
pub mod orchestrator;
pub mod quality;
pub mod similarity;
pub mod stats;
pub mod traits;
pub mod types;

pub use capability::Capabilities;
pub use config::{ConfigError, SentinelConfig};
pub use error::{InputError, SentinelError};
pub use orchestrator::{Sentinel, SentinelReferences};
pub use traits::Ring;
pub use types::*;
