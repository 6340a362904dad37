//! In-memory reference store.
//!
//! Each collection sits behind its own `RwLock`. Readers clone what they need
//! under the read lock, so a ring works on a consistent snapshot even while
//! the caller appends accepted data.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ContractStore, DateWindow, DuplicateCorpus, RateHistory, ReferenceError};
use crate::models::{
    normalize_key, select_active_contract, DuplicateSignature, FreightRateContract,
    HistoricalRateSample, Lane,
};

/// Serializable dump of all reference data (used by the CLI and fixtures).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceSnapshot {
    pub contracts: Vec<FreightRateContract>,
    pub samples: Vec<HistoricalRateSample>,
    pub signatures: Vec<DuplicateSignature>,
}

type SampleKey = (String, Lane);

#[derive(Default)]
pub struct MemoryReferenceStore {
    contracts: RwLock<Vec<FreightRateContract>>,
    samples: RwLock<HashMap<SampleKey, Vec<HistoricalRateSample>>>,
    signatures: RwLock<HashMap<String, BTreeMap<NaiveDate, Vec<DuplicateSignature>>>>,
}

impl MemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: ReferenceSnapshot) -> Result<Self, ReferenceError> {
        let store = Self::new();
        for contract in snapshot.contracts {
            store.insert_contract(contract)?;
        }
        for sample in snapshot.samples {
            store.append_sample(sample)?;
        }
        for signature in snapshot.signatures {
            store.insert(signature)?;
        }
        Ok(store)
    }

    pub fn insert_contract(&self, contract: FreightRateContract) -> Result<(), ReferenceError> {
        self.contracts
            .write()
            .map_err(|_| ReferenceError::LockPoisoned)?
            .push(contract);
        Ok(())
    }

    pub fn append_sample(&self, sample: HistoricalRateSample) -> Result<(), ReferenceError> {
        let key = (
            normalize_key(&sample.vendor_id),
            Lane::new(&sample.lane.origin, &sample.lane.destination),
        );
        let mut samples = self.samples.write().map_err(|_| ReferenceError::LockPoisoned)?;
        let series = samples.entry(key).or_default();
        series.push(sample);
        series.sort_by_key(|s| s.recorded_on);
        Ok(())
    }
}

impl ContractStore for MemoryReferenceStore {
    fn find_active_contract(
        &self,
        vendor_id: &str,
        origin: &str,
        destination: &str,
        service_type: &str,
        on_date: NaiveDate,
    ) -> Result<Option<FreightRateContract>, ReferenceError> {
        let contracts = self.contracts.read().map_err(|_| ReferenceError::LockPoisoned)?;
        let lane = Lane::new(origin, destination);
        Ok(select_active_contract(contracts.iter(), vendor_id, &lane, service_type, on_date).cloned())
    }
}

impl RateHistory for MemoryReferenceStore {
    fn sample_rates(&self, vendor_id: &str, lane: &Lane) -> Result<Vec<f64>, ReferenceError> {
        let samples = self.samples.read().map_err(|_| ReferenceError::LockPoisoned)?;
        let key = (normalize_key(vendor_id), Lane::new(&lane.origin, &lane.destination));
        Ok(samples
            .get(&key)
            .map(|series| series.iter().map(|s| s.rate).collect())
            .unwrap_or_default())
    }
}

impl DuplicateCorpus for MemoryReferenceStore {
    fn find_candidates(
        &self,
        vendor_id: &str,
        window: DateWindow,
    ) -> Result<Vec<DuplicateSignature>, ReferenceError> {
        let signatures = self.signatures.read().map_err(|_| ReferenceError::LockPoisoned)?;
        let Some(by_date) = signatures.get(&normalize_key(vendor_id)) else {
            return Ok(Vec::new());
        };
        Ok(by_date
            .range(window.from..=window.to)
            .flat_map(|(_, sigs)| sigs.iter().cloned())
            .collect())
    }

    fn insert(&self, signature: DuplicateSignature) -> Result<(), ReferenceError> {
        let mut signatures = self.signatures.write().map_err(|_| ReferenceError::LockPoisoned)?;
        signatures
            .entry(normalize_key(&signature.vendor_id))
            .or_default()
            .entry(signature.service_date)
            .or_default()
            .push(signature);
        Ok(())
    }
}
