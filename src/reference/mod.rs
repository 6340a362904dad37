//! Reference data the rings read: contracts, rate history, duplicate corpus.
//!
//! The Sentinel only reads through these traits. Writes (new samples, new
//! signatures) are made by the caller once a decision has been accepted
//! downstream, so an audit never observes another audit's uncommitted data.

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryReferenceStore, ReferenceSnapshot};
pub use sqlite::SqliteReferenceStore;

use chrono::{Duration, NaiveDate};
use thiserror::Error;

use crate::models::{DuplicateSignature, FreightRateContract, Lane};

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Reference store unavailable: {0}")]
    Unavailable(String),

    #[error("Reference store lock poisoned")]
    LockPoisoned,
}

/// Inclusive date range used to bound duplicate candidate retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateWindow {
    /// `center ± days`, inclusive on both ends.
    pub fn around(center: NaiveDate, days: u32) -> Self {
        let span = Duration::days(i64::from(days));
        Self {
            from: center - span,
            to: center + span,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }
}

/// Supplies the active freight-rate contract for a vendor/lane.
pub trait ContractStore: Send + Sync {
    fn find_active_contract(
        &self,
        vendor_id: &str,
        origin: &str,
        destination: &str,
        service_type: &str,
        on_date: NaiveDate,
    ) -> Result<Option<FreightRateContract>, ReferenceError>;
}

/// Per-(vendor, lane) historical rates, oldest first.
pub trait RateHistory: Send + Sync {
    fn sample_rates(&self, vendor_id: &str, lane: &Lane) -> Result<Vec<f64>, ReferenceError>;
}

/// Signatures of previously audited invoices.
pub trait DuplicateCorpus: Send + Sync {
    /// Signatures for `vendor_id` whose service date falls inside `window`.
    fn find_candidates(
        &self,
        vendor_id: &str,
        window: DateWindow,
    ) -> Result<Vec<DuplicateSignature>, ReferenceError>;

    /// Called by the caller after acceptance, never by the Sentinel.
    fn insert(&self, signature: DuplicateSignature) -> Result<(), ReferenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_inclusive() {
        let center = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let w = DateWindow::around(center, 7);
        assert!(w.contains(NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()));
        assert!(w.contains(NaiveDate::from_ymd_opt(2026, 3, 17).unwrap()));
        assert!(!w.contains(NaiveDate::from_ymd_opt(2026, 3, 18).unwrap()));
        assert!(!w.contains(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()));
    }

    #[test]
    fn traits_are_object_safe() {
        fn _assert_contracts(_: &dyn ContractStore) {}
        fn _assert_history(_: &dyn RateHistory) {}
        fn _assert_corpus(_: &dyn DuplicateCorpus) {}
    }
}
