//! Ring 1: deterministic contract matcher.
//!
//! Compares the declared amount against `max(base_rate × quantity, min_charge)`
//! of the active contract. Inside the tolerance band = PASS. Outside, severity
//! grows linearly with the relative deviation and saturates at `hard_deviation`.

use std::sync::Arc;

use tracing::warn;

use super::config::ContractRingConfig;
use super::traits::Ring;
use super::types::{AbstainCause, Evidence, MethodUsed, RingId, RingVerdict};
use crate::models::InvoiceCandidate;
use crate::reference::ContractStore;

pub struct ContractRing {
    contracts: Arc<dyn ContractStore>,
    config: ContractRingConfig,
}

impl ContractRing {
    pub fn new(contracts: Arc<dyn ContractStore>, config: ContractRingConfig) -> Self {
        Self { contracts, config }
    }
}

impl Ring for ContractRing {
    fn id(&self) -> RingId {
        RingId::ContractMatch
    }

    fn method(&self) -> MethodUsed {
        MethodUsed::preferred("contract_tolerance_band")
    }

    fn inspect(&self, invoice: &InvoiceCandidate) -> RingVerdict {
        let contract = match self.contracts.find_active_contract(
            &invoice.vendor_id,
            &invoice.origin,
            &invoice.destination,
            &invoice.service_type,
            invoice.service_date,
        ) {
            Ok(Some(contract)) => contract,
            Ok(None) => {
                return RingVerdict::abstain(
                    self.id(),
                    self.method(),
                    AbstainCause::NotApplicable,
                    "no active contract / spot rate",
                );
            }
            Err(e) => {
                warn!(invoice_id = %invoice.invoice_id, error = %e, "Contract lookup failed");
                return RingVerdict::abstain(
                    self.id(),
                    self.method(),
                    AbstainCause::LookupFailure,
                    format!("contract lookup failed: {e}"),
                );
            }
        };

        let basis = invoice.billing_basis;
        let expected = contract.expected_charge(basis.quantity);
        let declared = invoice.declared_amount;
        let deviation = contract.deviation(basis.quantity, declared);

        let evidence = Evidence::Contract {
            contract_id: contract.contract_id.clone(),
            expected_amount: expected,
            declared_amount: declared,
            deviation,
        };

        if deviation.abs() <= self.config.tolerance {
            return RingVerdict::pass(
                self.id(),
                self.method(),
                format!(
                    "within {:.1}% of contract {}",
                    self.config.tolerance * 100.0,
                    contract.contract_id
                ),
                evidence,
            );
        }

        let severity = (deviation.abs() / self.config.hard_deviation).min(1.0);
        let direction = if deviation > 0.0 { "over" } else { "under" };
        RingVerdict::flag(
            self.id(),
            self.method(),
            severity,
            format!(
                "declared {declared:.2} is {:.1}% {direction} contracted {expected:.2} ({} × {} under {})",
                deviation.abs() * 100.0,
                basis.quantity,
                basis.unit.as_str(),
                contract.contract_id
            ),
            evidence,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BillingBasis, BillingUnit, FreightRateContract, Lane};
    use crate::reference::{MemoryReferenceStore, ReferenceError};
    use crate::sentinel::types::VerdictStatus;
    use chrono::{NaiveDate, TimeZone, Utc};

    struct FailingStore;

    impl ContractStore for FailingStore {
        fn find_active_contract(
            &self,
            _vendor_id: &str,
            _origin: &str,
            _destination: &str,
            _service_type: &str,
            _on_date: NaiveDate,
        ) -> Result<Option<FreightRateContract>, ReferenceError> {
            Err(ReferenceError::Unavailable("connection refused".into()))
        }
    }

    fn invoice(amount: f64) -> InvoiceCandidate {
        InvoiceCandidate {
            invoice_id: "INV-1".into(),
            vendor_id: "Acme".into(),
            origin: "Mumbai".into(),
            destination: "Pune".into(),
            service_type: "FTL".into(),
            declared_amount: amount,
            billing_basis: BillingBasis::per_trip(),
            service_date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            remarks: String::new(),
            document_image: None,
            submitted_at: Utc.with_ymd_and_hms(2026, 3, 11, 0, 0, 0).unwrap(),
        }
    }

    fn ring_with_contract(base_rate: f64, min_charge: f64) -> ContractRing {
        let store = MemoryReferenceStore::new();
        store
            .insert_contract(FreightRateContract {
                contract_id: "C-100".into(),
                vendor_id: "acme".into(),
                lane: Lane::new("mumbai", "pune"),
                service_type: "ftl".into(),
                base_rate,
                min_charge,
                valid_from: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                valid_to: None,
            })
            .unwrap();
        ContractRing::new(Arc::new(store), ContractRingConfig::default())
    }

    #[test]
    fn within_tolerance_passes() {
        let ring = ring_with_contract(10_000.0, 0.0);
        let v = ring.inspect(&invoice(10_150.0));
        assert_eq!(v.status, VerdictStatus::Pass);
        assert_eq!(v.severity, 0.0);
        assert!(matches!(v.evidence, Evidence::Contract { ref contract_id, .. } if contract_id == "C-100"));
    }

    #[test]
    fn moderate_overcharge_scales_severity() {
        let ring = ring_with_contract(10_000.0, 0.0);
        let v = ring.inspect(&invoice(11_000.0));
        assert_eq!(v.status, VerdictStatus::Flag);
        // 10% / 25%
        assert!((v.severity - 0.4).abs() < 1e-9);
    }

    #[test]
    fn deviation_beyond_hard_limit_is_full_severity() {
        let ring = ring_with_contract(10_000.0, 0.0);
        let v = ring.inspect(&invoice(13_000.0));
        assert_eq!(v.status, VerdictStatus::Flag);
        assert_eq!(v.severity, 1.0);

        let v = ring.inspect(&invoice(5_000.0));
        assert_eq!(v.severity, 1.0);
        assert!(v.reason.contains("under"));
    }

    #[test]
    fn minimum_charge_applies_to_small_loads() {
        let ring = ring_with_contract(8.0, 5_000.0);
        let mut inv = invoice(5_000.0);
        inv.billing_basis = BillingBasis {
            quantity: 200.0,
            unit: BillingUnit::PerKg,
        };
        assert_eq!(ring.inspect(&inv).status, VerdictStatus::Pass);
    }

    #[test]
    fn spot_rate_abstains() {
        let ring = ContractRing::new(Arc::new(MemoryReferenceStore::new()), ContractRingConfig::default());
        let v = ring.inspect(&invoice(10_000.0));
        assert_eq!(v.status, VerdictStatus::Abstain);
        assert_eq!(v.abstain_cause, Some(AbstainCause::NotApplicable));
        assert_eq!(v.reason, "no active contract / spot rate");
    }

    #[test]
    fn lookup_failure_abstains_with_reason() {
        let ring = ContractRing::new(Arc::new(FailingStore), ContractRingConfig::default());
        let v = ring.inspect(&invoice(10_000.0));
        assert_eq!(v.abstain_cause, Some(AbstainCause::LookupFailure));
        assert!(matches!(v.evidence, Evidence::Failure { ref reason } if reason.contains("connection refused")));
    }

    #[test]
    fn zero_priced_contract() {
        let ring = ring_with_contract(0.0, 0.0);
        assert_eq!(ring.inspect(&invoice(0.0)).status, VerdictStatus::Pass);
        let v = ring.inspect(&invoice(100.0));
        assert_eq!(v.status, VerdictStatus::Flag);
        assert_eq!(v.severity, 1.0);
    }

    #[test]
    fn tolerance_band_is_inclusive() {
        let ring = ring_with_contract(10_000.0, 0.0);
        // Exactly ±2%
        assert_eq!(ring.inspect(&invoice(10_200.0)).status, VerdictStatus::Pass);
        assert_eq!(ring.inspect(&invoice(9_800.0)).status, VerdictStatus::Pass);

        let v = ring.inspect(&invoice(10_201.0));
        assert_eq!(v.status, VerdictStatus::Flag);
        assert!(v.severity > 0.0 && v.severity < 0.1);
    }

    #[test]
    fn flag_reason_names_billing_basis() {
        let ring = ring_with_contract(8.0, 0.0);
        let mut inv = invoice(2_400.0);
        inv.billing_basis = BillingBasis {
            quantity: 200.0,
            unit: BillingUnit::PerKg,
        };
        let v = ring.inspect(&inv);
        assert_eq!(v.status, VerdictStatus::Flag);
        assert!(v.reason.contains("200 × per_kg"), "{}", v.reason);
        assert!(v.reason.contains("50.0% over"));
    }
}
