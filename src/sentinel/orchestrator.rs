//! Sentinel orchestrator.
//!
//! Validates the invoice, fans the rings out onto the blocking pool, waits for
//! every ring (each under its own deadline) and aggregates the verdicts into one
//! advisory decision. Only structural input errors reach the caller.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::aggregate::aggregate;
use super::anomaly_ring::AnomalyRing;
use super::capability::Capabilities;
use super::config::{ConfigError, SentinelConfig};
use super::contract_ring::ContractRing;
use super::duplicate_ring::DuplicateRing;
use super::error::SentinelError;
use super::image_ring::ImageRing;
use super::traits::Ring;
use super::types::{AbstainCause, AuditDecision, DecisionWarning, RingBinding, RingVerdict};
use crate::models::InvoiceCandidate;
use crate::reference::{ContractStore, DuplicateCorpus, RateHistory};

/// The reference components the rings read from.
#[derive(Clone)]
pub struct SentinelReferences {
    pub contracts: Arc<dyn ContractStore>,
    pub history: Arc<dyn RateHistory>,
    pub corpus: Arc<dyn DuplicateCorpus>,
}

impl SentinelReferences {
    /// One store serving all three roles.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: ContractStore + RateHistory + DuplicateCorpus + 'static,
    {
        Self {
            contracts: store.clone(),
            history: store.clone(),
            corpus: store,
        }
    }
}

pub struct Sentinel {
    config: SentinelConfig,
    capabilities: Capabilities,
    rings: Vec<Arc<dyn Ring>>,
}

impl Sentinel {
    /// Resolve capabilities and bind the four rings.
    pub fn new(config: SentinelConfig, references: SentinelReferences) -> Result<Self, ConfigError> {
        config.validate()?;
        let capabilities = Capabilities::resolve(&config.capabilities);
        let rings: Vec<Arc<dyn Ring>> = vec![
            Arc::new(ContractRing::new(references.contracts.clone(), config.contract.clone())),
            Arc::new(AnomalyRing::new(
                references.history,
                references.contracts,
                config.anomaly.clone(),
                config.contract.tolerance,
                capabilities.statistics_library,
            )),
            Arc::new(ImageRing::new(config.image.clone(), capabilities.image_inspection)),
            Arc::new(DuplicateRing::new(
                references.corpus,
                config.duplicate.clone(),
                capabilities.edit_distance,
            )),
        ];
        Ok(Self::assemble(config, capabilities, rings))
    }

    /// Build with caller-supplied rings (custom checks, test doubles).
    pub fn with_rings(config: SentinelConfig, rings: Vec<Arc<dyn Ring>>) -> Result<Self, ConfigError> {
        config.validate()?;
        let capabilities = Capabilities::resolve(&config.capabilities);
        Ok(Self::assemble(config, capabilities, rings))
    }

    fn assemble(config: SentinelConfig, capabilities: Capabilities, rings: Vec<Arc<dyn Ring>>) -> Self {
        for ring in &rings {
            let method = ring.method();
            info!(
                ring = ring.id().as_str(),
                method = %method,
                degraded = method.is_degraded(),
                "Ring bound"
            );
        }
        Self {
            config,
            capabilities,
            rings,
        }
    }

    pub fn config(&self) -> &SentinelConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Which method each ring is bound to, in ring order.
    pub fn bindings(&self) -> Vec<RingBinding> {
        let mut bindings: Vec<RingBinding> = self
            .rings
            .iter()
            .map(|ring| RingBinding {
                ring: ring.id(),
                method: ring.method(),
            })
            .collect();
        bindings.sort_by_key(|b| b.ring);
        bindings
    }

    /// Audit one invoice.
    pub async fn audit(&self, invoice: InvoiceCandidate) -> Result<AuditDecision, SentinelError> {
        let warnings = match invoice.validate() {
            Ok(warnings) => warnings,
            Err(e) => {
                warn!(invoice_id = %invoice.invoice_id, error = %e, "Invoice rejected before audit");
                return Err(e.into());
            }
        };
        for warning in &warnings {
            match warning {
                DecisionWarning::SubmittedBeforeService {
                    submitted_at,
                    service_date,
                } => warn!(
                    invoice_id = %invoice.invoice_id,
                    %submitted_at,
                    %service_date,
                    "Invoice submitted before its service date"
                ),
            }
        }

        let invoice = Arc::new(invoice);
        let budget = self.config.ring_budget();
        let tasks = self
            .rings
            .iter()
            .map(|ring| run_ring(Arc::clone(ring), Arc::clone(&invoice), budget));
        let mut verdicts = join_all(tasks).await;
        verdicts.sort_by_key(|v| v.ring);

        for v in verdicts.iter().filter(|v| !v.contributes()) {
            debug!(
                invoice_id = %invoice.invoice_id,
                ring = v.ring.as_str(),
                cause = ?v.abstain_cause,
                reason = %v.reason,
                "Ring abstained"
            );
        }

        let outcome = aggregate(&verdicts, &self.config);
        let decision = AuditDecision {
            audit_id: Uuid::new_v4(),
            invoice_id: invoice.invoice_id.clone(),
            status: outcome.status,
            risk_score: outcome.risk_score,
            verdicts,
            warnings,
            decided_at: Utc::now(),
        };

        info!(
            invoice_id = %decision.invoice_id,
            audit_id = %decision.audit_id,
            status = %decision.status,
            risk_score = decision.risk_score,
            abstained = decision.abstentions().count(),
            degraded = decision.degraded_rings().count(),
            "Audit decided"
        );
        Ok(decision)
    }

    /// Audit from synchronous code on a private current-thread runtime.
    pub fn audit_blocking(&self, invoice: InvoiceCandidate) -> Result<AuditDecision, SentinelError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let result = runtime.block_on(self.audit(invoice));
        // A timed-out ring may still be running; don't wait for it.
        runtime.shutdown_background();
        result
    }

    /// Audit several invoices concurrently. Results are in input order.
    pub async fn audit_batch(
        &self,
        invoices: Vec<InvoiceCandidate>,
    ) -> Vec<Result<AuditDecision, SentinelError>> {
        join_all(invoices.into_iter().map(|invoice| self.audit(invoice))).await
    }
}

/// Run one ring on the blocking pool under its deadline. Always yields a verdict.
async fn run_ring(ring: Arc<dyn Ring>, invoice: Arc<InvoiceCandidate>, budget: Duration) -> RingVerdict {
    let id = ring.id();
    let method = ring.method();
    let invoice_id = invoice.invoice_id.clone();

    let task = tokio::task::spawn_blocking(move || ring.inspect(&invoice));
    match tokio::time::timeout(budget, task).await {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(e)) => {
            error!(invoice_id = %invoice_id, ring = id.as_str(), error = %e, "Ring task failed");
            RingVerdict::abstain(
                id,
                method,
                AbstainCause::RingFailure,
                format!("ring task failed: {e}"),
            )
        }
        Err(_) => {
            warn!(
                invoice_id = %invoice_id,
                ring = id.as_str(),
                budget_ms = budget.as_millis() as u64,
                "Ring exceeded its time budget"
            );
            RingVerdict::abstain(id, method, AbstainCause::Timeout, "timeout")
        }
    }
}
