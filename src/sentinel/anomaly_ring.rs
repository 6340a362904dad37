//! Ring 2: statistical anomaly detector.
//!
//! Z-score of the invoice's unit rate against the (vendor, lane) history.
//! Severity: 0.5 at `flag_z`, rising linearly to 1.0 at `hard_z`.
//!
//! Applies to spot rates and to contracted rates that leave the contract's
//! tolerance band. A rate the active contract already accounts for is the
//! contract's business, not the history's.

use std::sync::Arc;

use tracing::{debug, warn};

use super::config::AnomalyRingConfig;
use super::stats::{select_backend, z_score};
use super::traits::{Ring, StatisticsBackend};
use super::types::{AbstainCause, Evidence, MethodUsed, RingId, RingVerdict};
use crate::models::InvoiceCandidate;
use crate::reference::{ContractStore, RateHistory};

pub struct AnomalyRing {
    history: Arc<dyn RateHistory>,
    contracts: Arc<dyn ContractStore>,
    config: AnomalyRingConfig,
    /// Same band Ring 1 uses to call a contracted rate compliant.
    contract_tolerance: f64,
    backend: Box<dyn StatisticsBackend>,
    preferred: bool,
}

impl AnomalyRing {
    pub fn new(
        history: Arc<dyn RateHistory>,
        contracts: Arc<dyn ContractStore>,
        config: AnomalyRingConfig,
        contract_tolerance: f64,
        statistics_library: bool,
    ) -> Self {
        let (backend, preferred) = select_backend(statistics_library);
        Self {
            history,
            contracts,
            config,
            contract_tolerance,
            backend,
            preferred,
        }
    }

    /// Id of the active contract when the declared amount is inside its band.
    ///
    /// A failed lookup counts as "no contract": the rate is then scrutinized
    /// as spot, and Ring 1 reports the failure.
    fn governing_contract(&self, invoice: &InvoiceCandidate) -> Option<String> {
        match self.contracts.find_active_contract(
            &invoice.vendor_id,
            &invoice.origin,
            &invoice.destination,
            &invoice.service_type,
            invoice.service_date,
        ) {
            Ok(Some(contract))
                if contract.within_tolerance(
                    invoice.billing_basis.quantity,
                    invoice.declared_amount,
                    self.contract_tolerance,
                ) =>
            {
                Some(contract.contract_id)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(invoice_id = %invoice.invoice_id, error = %e, "Contract lookup failed, treating rate as spot");
                None
            }
        }
    }

    fn severity(&self, abs_z: f64) -> Option<f64> {
        let AnomalyRingConfig { flag_z, hard_z, .. } = self.config;
        if abs_z >= hard_z {
            Some(1.0)
        } else if abs_z >= flag_z {
            Some(0.5 + 0.5 * (abs_z - flag_z) / (hard_z - flag_z))
        } else {
            None
        }
    }
}

impl Ring for AnomalyRing {
    fn id(&self) -> RingId {
        RingId::StatisticalAnomaly
    }

    fn method(&self) -> MethodUsed {
        if self.preferred {
            MethodUsed::preferred(self.backend.name())
        } else {
            MethodUsed::fallback(self.backend.name())
        }
    }

    fn inspect(&self, invoice: &InvoiceCandidate) -> RingVerdict {
        let Some(rate) = invoice.unit_rate() else {
            return RingVerdict::abstain(
                self.id(),
                self.method(),
                AbstainCause::NotApplicable,
                "billing quantity is zero; no unit rate",
            );
        };

        if let Some(contract_id) = self.governing_contract(invoice) {
            debug!(invoice_id = %invoice.invoice_id, contract_id = %contract_id, "Rate within contract, skipping history");
            return RingVerdict::abstain(
                self.id(),
                self.method(),
                AbstainCause::NotApplicable,
                format!("rate governed by contract {contract_id}"),
            );
        }

        let lane = invoice.lane();
        let samples = match self.history.sample_rates(&invoice.vendor_id, &lane) {
            Ok(samples) => samples,
            Err(e) => {
                warn!(invoice_id = %invoice.invoice_id, error = %e, "Rate history lookup failed");
                return RingVerdict::abstain(
                    self.id(),
                    self.method(),
                    AbstainCause::LookupFailure,
                    format!("rate history lookup failed: {e}"),
                );
            }
        };

        let population = samples.iter().filter(|r| r.is_finite()).count();
        if population < self.config.min_samples {
            debug!(invoice_id = %invoice.invoice_id, population, lane = %lane, "Not enough rate history");
            return RingVerdict::abstain(
                self.id(),
                self.method(),
                AbstainCause::InsufficientData,
                format!(
                    "only {population} historical samples for {lane} (need {})",
                    self.config.min_samples
                ),
            );
        }

        let Some(summary) = self.backend.summarize(&samples) else {
            return RingVerdict::abstain(
                self.id(),
                self.method(),
                AbstainCause::InsufficientData,
                "rate history could not be summarized",
            );
        };

        let z = z_score(rate, &summary);
        let evidence = Evidence::Statistical {
            unit_rate: rate,
            mean: summary.mean,
            stddev: summary.stddev,
            z_score: z,
            sample_size: summary.count,
        };

        match self.severity(z.abs()) {
            Some(severity) => RingVerdict::flag(
                self.id(),
                self.method(),
                severity,
                format!(
                    "unit rate {rate:.2} is {z:+.1} standard deviations from the {lane} mean {:.2}",
                    summary.mean
                ),
                evidence,
            ),
            None => RingVerdict::pass(
                self.id(),
                self.method(),
                format!("unit rate within {:.1} standard deviations", self.config.flag_z),
                evidence,
            ),
        }
    }
}
