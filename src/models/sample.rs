use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Lane;

/// A past accepted per-unit rate for a (vendor, lane). Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRateSample {
    pub vendor_id: String,
    pub lane: Lane,
    pub rate: f64,
    pub recorded_on: NaiveDate,
}
