//! Command-line front end: audit a batch of invoices against a reference snapshot.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Serialize;
use thiserror::Error;

use crate::config;
use crate::models::InvoiceCandidate;
use crate::reference::{MemoryReferenceStore, ReferenceError, ReferenceSnapshot};
use crate::sentinel::{AuditDecision, ConfigError, Sentinel, SentinelConfig, SentinelReferences};

#[derive(Parser, Debug)]
#[command(name = "freight-sentinel", version)]
#[command(about = "Pre-audit freight invoices before payment", long_about = None)]
pub struct Cli {
    /// Reference snapshot: contracts, rate samples, prior duplicate signatures
    pub snapshot: PathBuf,

    /// Invoice candidates to audit (JSON array)
    pub invoices: PathBuf,

    /// Sentinel config. Falls back to ~/FreightSentinel/sentinel.json, then defaults
    pub config: Option<PathBuf>,
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Reference snapshot rejected: {0}")]
    Reference(#[from] ReferenceError),
}

/// One line of CLI output per input invoice.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuditReport {
    Decided(AuditDecision),
    Rejected { invoice_id: String, error: String },
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn load_config(explicit: Option<&Path>) -> Result<SentinelConfig, CliError> {
    if let Some(path) = explicit {
        return Ok(SentinelConfig::load(path)?);
    }
    match config::default_config_path() {
        Some(path) if path.is_file() => Ok(SentinelConfig::load(&path)?),
        _ => {
            tracing::debug!("No sentinel config found, using defaults");
            Ok(SentinelConfig::default())
        }
    }
}

/// Load inputs, audit every invoice, and return one report per invoice in input order.
pub async fn execute(cli: &Cli) -> Result<Vec<AuditReport>, CliError> {
    let sentinel_config = load_config(cli.config.as_deref())?;
    let snapshot: ReferenceSnapshot = read_json(&cli.snapshot)?;
    let invoices: Vec<InvoiceCandidate> = read_json(&cli.invoices)?;

    tracing::info!(
        contracts = snapshot.contracts.len(),
        samples = snapshot.samples.len(),
        signatures = snapshot.signatures.len(),
        invoices = invoices.len(),
        "Inputs loaded"
    );

    let store = std::sync::Arc::new(MemoryReferenceStore::from_snapshot(snapshot)?);
    let sentinel = Sentinel::new(sentinel_config, SentinelReferences::shared(store))?;

    let ids: Vec<String> = invoices.iter().map(|inv| inv.invoice_id.clone()).collect();
    let results = sentinel.audit_batch(invoices).await;

    Ok(ids
        .into_iter()
        .zip(results)
        .map(|(invoice_id, result)| match result {
            Ok(decision) => AuditReport::Decided(decision),
            Err(e) => AuditReport::Rejected {
                invoice_id,
                error: e.to_string(),
            },
        })
        .collect())
}
