//! Learned playbook store.
//!
//! SQLite-backed repository of playbooks synthesized from advisory
//! output, keyed uniquely by anomaly signature. The store owns the
//! canonical copy of every record; callers get snapshots.
//!
//! Concurrency contract:
//! - `upsert_if_absent` creates at most one record per signature under
//!   concurrent callers (unique column + conflict-then-reread, all
//!   inside one lock acquisition). The loser of a race simply observes
//!   the winner's record.
//! - `apply_outcome` is a single read-modify-write transaction per
//!   playbook id; concurrent outcomes serialize and never lose updates.
//! - A busy database is retried a bounded number of times, then
//!   surfaced as `PersistenceUnavailable`.

use remedy_common::{
    EngineError, ExecutionResult, LearnedPlaybook, PlaybookSource, Signature,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Attempts before a busy database becomes `PersistenceUnavailable`.
const MAX_BUSY_ATTEMPTS: u32 = 3;

pub struct LearnedPlaybookStore {
    conn: Arc<Mutex<Connection>>,
}

impl LearnedPlaybookStore {
    /// Open or create the store at the given path.
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        info!("Learned playbook store open at {:?}", path);
        Ok(store)
    }

    /// In-memory store for tests and ephemeral runs.
    pub fn open_in_memory() -> Result<Self, EngineError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), EngineError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS learned_playbooks (
                id TEXT PRIMARY KEY,
                anomaly_signature TEXT NOT NULL UNIQUE,
                anomaly_type TEXT NOT NULL,
                name TEXT NOT NULL,
                confidence REAL NOT NULL,
                source TEXT NOT NULL,
                created_at TEXT NOT NULL,
                created_by TEXT NOT NULL,
                origin_incident_id TEXT NOT NULL,
                execution_count INTEGER NOT NULL,
                success_count INTEGER NOT NULL,
                failure_count INTEGER NOT NULL,
                last_execution_at TEXT,
                content TEXT NOT NULL,
                content_ref TEXT NOT NULL
            )
            "#,
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_learned_anomaly_type
             ON learned_playbooks(anomaly_type)",
            [],
        )?;
        Ok(())
    }

    /// Exact-signature lookup; the hot path of the matcher.
    pub fn get_by_signature(
        &self,
        signature: &Signature,
    ) -> Result<Option<LearnedPlaybook>, EngineError> {
        retry_busy(|| {
            let conn = self.conn.lock().unwrap();
            let row = conn
                .query_row(
                    "SELECT * FROM learned_playbooks WHERE anomaly_signature = ?",
                    params![signature.as_str()],
                    row_to_playbook,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Create the record unless one already exists for its signature;
    /// either way, return the committed record.
    pub fn upsert_if_absent(
        &self,
        candidate: LearnedPlaybook,
    ) -> Result<LearnedPlaybook, EngineError> {
        retry_busy(|| {
            let mut conn = self.conn.lock().unwrap();
            let tx = conn.transaction()?;

            let inserted = tx.execute(
                r#"
                INSERT OR IGNORE INTO learned_playbooks (
                    id, anomaly_signature, anomaly_type, name, confidence,
                    source, created_at, created_by, origin_incident_id,
                    execution_count, success_count, failure_count,
                    last_execution_at, content, content_ref
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    candidate.id,
                    candidate.anomaly_signature.as_str(),
                    candidate.anomaly_type,
                    candidate.name,
                    candidate.confidence,
                    candidate.source.as_str(),
                    candidate.created_at,
                    candidate.created_by,
                    candidate.origin_incident_id,
                    candidate.execution_count as i64,
                    candidate.success_count as i64,
                    candidate.failure_count as i64,
                    candidate.last_execution_at,
                    candidate.content,
                    candidate.content_ref,
                ],
            )?;

            let committed = tx
                .query_row(
                    "SELECT * FROM learned_playbooks WHERE anomaly_signature = ?",
                    params![candidate.anomaly_signature.as_str()],
                    row_to_playbook,
                )
                .optional()?
                // Inserted-or-existing, the row must be there now.
                .ok_or(EngineError::StoreConflict)?;
            tx.commit()?;

            if inserted > 0 {
                info!(
                    "Learned playbook {} created for signature {}",
                    committed.id, committed.anomaly_signature
                );
            } else {
                debug!(
                    "Signature {} already has playbook {}, keeping it",
                    committed.anomaly_signature, committed.id
                );
            }
            Ok(committed)
        })
    }

    /// Atomically apply an execution outcome to a learned playbook.
    ///
    /// An unknown id is a hard error: it means the executor reported
    /// against a record this store never committed.
    pub fn apply_outcome(
        &self,
        playbook_id: &str,
        result: ExecutionResult,
        at: DateTime<Utc>,
    ) -> Result<LearnedPlaybook, EngineError> {
        retry_busy(|| {
            let mut conn = self.conn.lock().unwrap();
            let tx = conn.transaction()?;

            let mut playbook = tx
                .query_row(
                    "SELECT * FROM learned_playbooks WHERE id = ?",
                    params![playbook_id],
                    row_to_playbook,
                )
                .optional()?
                .ok_or_else(|| EngineError::UnknownPlaybook(playbook_id.to_string()))?;

            match result {
                ExecutionResult::Success => playbook.record_success(at),
                ExecutionResult::Failure => playbook.record_failure(at),
            }

            tx.execute(
                r#"
                UPDATE learned_playbooks
                SET confidence = ?, execution_count = ?, success_count = ?,
                    failure_count = ?, last_execution_at = ?
                WHERE id = ?
                "#,
                params![
                    playbook.confidence,
                    playbook.execution_count as i64,
                    playbook.success_count as i64,
                    playbook.failure_count as i64,
                    playbook.last_execution_at,
                    playbook.id,
                ],
            )?;
            tx.commit()?;

            debug!(
                "Applied {:?} to {}: confidence now {:.2} ({} runs)",
                result, playbook.id, playbook.confidence, playbook.execution_count
            );
            Ok(playbook)
        })
    }

    /// All learned playbooks for an anomaly type; audit/reporting only.
    pub fn list_by_type(&self, anomaly_type: &str) -> Result<Vec<LearnedPlaybook>, EngineError> {
        retry_busy(|| {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT * FROM learned_playbooks WHERE anomaly_type = ? ORDER BY id",
            )?;
            let rows = stmt
                .query_map(params![anomaly_type], row_to_playbook)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

impl Clone for LearnedPlaybookStore {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

fn row_to_playbook(row: &Row<'_>) -> rusqlite::Result<LearnedPlaybook> {
    let source_raw: String = row.get("source")?;
    let source = PlaybookSource::parse(&source_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown playbook source: {}", source_raw).into(),
        )
    })?;
    let signature: String = row.get("anomaly_signature")?;

    Ok(LearnedPlaybook {
        id: row.get("id")?,
        anomaly_signature: Signature::new(signature),
        anomaly_type: row.get("anomaly_type")?,
        name: row.get("name")?,
        confidence: row.get("confidence")?,
        source,
        created_at: row.get("created_at")?,
        created_by: row.get("created_by")?,
        origin_incident_id: row.get("origin_incident_id")?,
        execution_count: row.get::<_, i64>("execution_count")? as u64,
        success_count: row.get::<_, i64>("success_count")? as u64,
        failure_count: row.get::<_, i64>("failure_count")? as u64,
        last_execution_at: row.get("last_execution_at")?,
        content: row.get("content")?,
        content_ref: row.get("content_ref")?,
    })
}

fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::DatabaseBusy
                || f.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

/// Bounded retry around a store operation holding no lock between
/// attempts. Only busy/locked errors are retried; everything else,
/// including `UnknownPlaybook`, passes straight through.
fn retry_busy<T>(mut op: impl FnMut() -> Result<T, EngineError>) -> Result<T, EngineError> {
    let mut attempt: u32 = 1;
    loop {
        match op() {
            Err(EngineError::Database(ref e)) if is_busy(e) => {
                if attempt >= MAX_BUSY_ATTEMPTS {
                    return Err(EngineError::PersistenceUnavailable(format!(
                        "store busy after {} attempts",
                        attempt
                    )));
                }
                std::thread::sleep(Duration::from_millis(20 * u64::from(attempt)));
                attempt += 1;
            }
            other => return other,
        }
    }
}
