use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use super::{ContractStore, DateWindow, DuplicateCorpus, RateHistory, ReferenceError};
use crate::models::{
    normalize_key, DuplicateSignature, FreightRateContract, HistoricalRateSample, Lane,
};

/// SQLite-backed reference store. One connection, serialized behind a mutex.
pub struct SqliteReferenceStore {
    conn: Mutex<Connection>,
}

impl SqliteReferenceStore {
    /// Open a SQLite database at the given path and run migrations
    pub fn open(path: &Path) -> Result<Self, ReferenceError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, ReferenceError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, ReferenceError> {
        configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ReferenceError> {
        self.conn.lock().map_err(|_| ReferenceError::LockPoisoned)
    }

    pub fn insert_contract(&self, contract: &FreightRateContract) -> Result<(), ReferenceError> {
        let lane = Lane::new(&contract.lane.origin, &contract.lane.destination);
        self.lock()?.execute(
            "INSERT OR REPLACE INTO contracts
                (contract_id, vendor_id, origin, destination, service_type,
                 base_rate, min_charge, valid_from, valid_to)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                contract.contract_id,
                normalize_key(&contract.vendor_id),
                lane.origin,
                lane.destination,
                normalize_key(&contract.service_type),
                contract.base_rate,
                contract.min_charge,
                contract.valid_from,
                contract.valid_to,
            ],
        )?;
        Ok(())
    }

    pub fn append_sample(&self, sample: &HistoricalRateSample) -> Result<(), ReferenceError> {
        let lane = Lane::new(&sample.lane.origin, &sample.lane.destination);
        self.lock()?.execute(
            "INSERT INTO rate_samples (vendor_id, origin, destination, rate, recorded_on)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                normalize_key(&sample.vendor_id),
                lane.origin,
                lane.destination,
                sample.rate,
                sample.recorded_on,
            ],
        )?;
        Ok(())
    }
}

fn configure_pragmas(conn: &Connection) -> Result<(), ReferenceError> {
    conn.execute_batch(
        "PRAGMA journal_mode=DELETE;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<(), ReferenceError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![
        (1, include_str!("../../resources/migrations/001_reference_data.sql")),
        (2, include_str!("../../resources/migrations/002_duplicate_signatures.sql")),
    ];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql).map_err(|e| ReferenceError::MigrationFailed {
                version,
                reason: e.to_string(),
            })?;
        }
    }

    Ok(())
}

/// Get the current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

impl ContractStore for SqliteReferenceStore {
    fn find_active_contract(
        &self,
        vendor_id: &str,
        origin: &str,
        destination: &str,
        service_type: &str,
        on_date: NaiveDate,
    ) -> Result<Option<FreightRateContract>, ReferenceError> {
        let lane = Lane::new(origin, destination);
        let conn = self.lock()?;
        let contract = conn
            .query_row(
                "SELECT contract_id, vendor_id, origin, destination, service_type,
                        base_rate, min_charge, valid_from, valid_to
                 FROM contracts
                 WHERE vendor_id = ?1 AND origin = ?2 AND destination = ?3
                   AND service_type = ?4
                   AND valid_from <= ?5
                   AND (valid_to IS NULL OR valid_to >= ?5)
                 ORDER BY valid_from DESC
                 LIMIT 1",
                params![
                    normalize_key(vendor_id),
                    lane.origin,
                    lane.destination,
                    normalize_key(service_type),
                    on_date,
                ],
                |row| {
                    Ok(FreightRateContract {
                        contract_id: row.get(0)?,
                        vendor_id: row.get(1)?,
                        lane: Lane {
                            origin: row.get(2)?,
                            destination: row.get(3)?,
                        },
                        service_type: row.get(4)?,
                        base_rate: row.get(5)?,
                        min_charge: row.get(6)?,
                        valid_from: row.get(7)?,
                        valid_to: row.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(contract)
    }
}

impl RateHistory for SqliteReferenceStore {
    fn sample_rates(&self, vendor_id: &str, lane: &Lane) -> Result<Vec<f64>, ReferenceError> {
        let lane = Lane::new(&lane.origin, &lane.destination);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT rate FROM rate_samples
             WHERE vendor_id = ?1 AND origin = ?2 AND destination = ?3
             ORDER BY recorded_on, id",
        )?;
        let rates = stmt
            .query_map(
                params![normalize_key(vendor_id), lane.origin, lane.destination],
                |row| row.get::<_, f64>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rates)
    }
}

impl DuplicateCorpus for SqliteReferenceStore {
    fn find_candidates(
        &self,
        vendor_id: &str,
        window: DateWindow,
    ) -> Result<Vec<DuplicateSignature>, ReferenceError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT invoice_id, vendor_id, amount, service_date, route, remarks,
                    fingerprint, image_hash
             FROM duplicate_signatures
             WHERE vendor_id = ?1 AND service_date >= ?2 AND service_date <= ?3
             ORDER BY service_date, id",
        )?;
        let signatures = stmt
            .query_map(
                params![normalize_key(vendor_id), window.from, window.to],
                |row| {
                    Ok(DuplicateSignature {
                        invoice_id: row.get(0)?,
                        vendor_id: row.get(1)?,
                        amount: row.get(2)?,
                        service_date: row.get(3)?,
                        route: row.get(4)?,
                        remarks: row.get(5)?,
                        fingerprint: row.get(6)?,
                        image_hash: row.get(7)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(signatures)
    }

    fn insert(&self, signature: DuplicateSignature) -> Result<(), ReferenceError> {
        self.lock()?.execute(
            "INSERT INTO duplicate_signatures
                (invoice_id, vendor_id, amount, service_date, route, remarks,
                 fingerprint, image_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                signature.invoice_id,
                normalize_key(&signature.vendor_id),
                signature.amount,
                signature.service_date,
                signature.route,
                signature.remarks,
                signature.fingerprint,
                signature.image_hash,
            ],
        )?;
        Ok(())
    }
}
