pub mod invoice;
pub mod contract;
pub mod sample;
pub mod signature;

pub use invoice::*;
pub use contract::*;
pub use sample::*;
pub use signature::*;

use serde::{Deserialize, Serialize};

/// Lowercase, trim, and collapse internal whitespace. Used for every
/// vendor/location/service key so lookups are insensitive to formatting.
pub fn normalize_key(raw: &str) -> String {
    raw.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// An origin → destination pair, stored normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Lane {
    pub origin: String,
    pub destination: String,
}

impl Lane {
    pub fn new(origin: &str, destination: &str) -> Self {
        Self {
            origin: normalize_key(origin),
            destination: normalize_key(destination),
        }
    }

    pub fn is_round_trip(&self) -> bool {
        self.origin == self.destination
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.origin, self.destination)
    }
}
