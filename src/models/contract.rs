use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{normalize_key, Lane};

/// Freight-rate contract owned by the contract reference store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreightRateContract {
    pub contract_id: String,
    pub vendor_id: String,
    pub lane: Lane,
    pub service_type: String,
    /// Rate per billing unit.
    pub base_rate: f64,
    pub min_charge: f64,
    pub valid_from: NaiveDate,
    /// Inclusive. `None` = open-ended.
    #[serde(default)]
    pub valid_to: Option<NaiveDate>,
}

impl FreightRateContract {
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        date >= self.valid_from && self.valid_to.map_or(true, |end| date <= end)
    }

    /// `lane` must already be normalized (see `Lane::new`).
    pub fn covers(&self, vendor_id: &str, lane: &Lane, service_type: &str) -> bool {
        normalize_key(&self.vendor_id) == normalize_key(vendor_id)
            && Lane::new(&self.lane.origin, &self.lane.destination) == *lane
            && normalize_key(&self.service_type) == normalize_key(service_type)
    }

    /// Contracted charge for a shipment: `max(base_rate × quantity, min_charge)`.
    pub fn expected_charge(&self, quantity: f64) -> f64 {
        (self.base_rate * quantity).max(self.min_charge)
    }

    /// Relative deviation `(declared − expected) / expected`.
    /// A zero-priced contract is only matched by a zero invoice; anything else is infinitely off.
    pub fn deviation(&self, quantity: f64, declared: f64) -> f64 {
        let expected = self.expected_charge(quantity);
        if expected > 0.0 {
            (declared - expected) / expected
        } else if declared == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    }

    /// Whether `declared` sits inside the inclusive ±`tolerance` band.
    pub fn within_tolerance(&self, quantity: f64, declared: f64, tolerance: f64) -> bool {
        self.deviation(quantity, declared).abs() <= tolerance
    }
}

/// Pick the active contract for (vendor, lane, service type, date).
///
/// When amendments overlap, the one with the latest `valid_from` wins.
pub fn select_active_contract<'a, I>(
    contracts: I,
    vendor_id: &str,
    lane: &Lane,
    service_type: &str,
    on_date: NaiveDate,
) -> Option<&'a FreightRateContract>
where
    I: IntoIterator<Item = &'a FreightRateContract>,
{
    contracts
        .into_iter()
        .filter(|c| c.covers(vendor_id, lane, service_type) && c.is_active_on(on_date))
        .max_by_key(|c| c.valid_from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn contract(id: &str, from: NaiveDate, to: Option<NaiveDate>) -> FreightRateContract {
        FreightRateContract {
            contract_id: id.into(),
            vendor_id: "acme logistics".into(),
            lane: Lane::new("Mumbai", "Pune"),
            service_type: "32ft mxl".into(),
            base_rate: 12_000.0,
            min_charge: 10_000.0,
            valid_from: from,
            valid_to: to,
        }
    }

    #[test]
    fn validity_window_is_inclusive() {
        let c = contract("C1", date(2026, 1, 1), Some(date(2026, 12, 31)));
        assert!(c.is_active_on(date(2026, 1, 1)));
        assert!(c.is_active_on(date(2026, 12, 31)));
        assert!(!c.is_active_on(date(2025, 12, 31)));
        assert!(!c.is_active_on(date(2027, 1, 1)));
    }

    #[test]
    fn open_ended_contract_stays_active() {
        let c = contract("C1", date(2026, 1, 1), None);
        assert!(c.is_active_on(date(2030, 6, 1)));
    }

    #[test]
    fn expected_charge_respects_minimum() {
        let mut c = contract("C1", date(2026, 1, 1), None);
        c.base_rate = 8.0;
        c.min_charge = 5_000.0;
        assert_eq!(c.expected_charge(100.0), 5_000.0);
        assert_eq!(c.expected_charge(1_000.0), 8_000.0);
    }

    #[test]
    fn latest_amendment_wins() {
        let contracts = vec![
            contract("C-OLD", date(2025, 1, 1), None),
            contract("C-NEW", date(2026, 2, 1), None),
            contract("C-EXPIRED", date(2026, 3, 1), Some(date(2026, 3, 5))),
        ];
        let lane = Lane::new("mumbai", "pune");
        let found =
            select_active_contract(&contracts, "ACME Logistics", &lane, "32FT MXL", date(2026, 3, 10))
                .unwrap();
        assert_eq!(found.contract_id, "C-NEW");
    }

    #[test]
    fn no_match_for_other_service_type() {
        let contracts = vec![contract("C1", date(2026, 1, 1), None)];
        let lane = Lane::new("mumbai", "pune");
        assert!(select_active_contract(&contracts, "acme logistics", &lane, "20ft sxl", date(2026, 3, 10))
            .is_none());
    }
}
