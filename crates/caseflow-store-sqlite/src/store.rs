// crates/caseflow-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite-Backed Stores
// Description: GateStore, SessionStore, EscalationStore, ExemplarStore, and
//              AuditSink, all backed by one SQLite connection under WAL.
// Purpose: Give the orchestration engine a durable, file-based store for
//          single-node deployments without scattering SQL through every
//          crate that needs to persist a record.
// Dependencies: caseflow-core, rusqlite, serde_json, thiserror, time
// ============================================================================

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use caseflow_core::{
    AuditEntry, AuditEntryId, AuditSink, CaseId, ClarificationSession, CoreError, Escalation,
    EscalationId, EscalationStatus, EscalationStore, ExemplarId, ExemplarStore, GateId,
    GateStatus, GateStore, MuscleMemoryExemplar, QualityGateRecord, SessionId, SessionStore,
    Timestamp,
};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use thiserror::Error;
use time::OffsetDateTime;

/// `SQLite` schema version this crate creates and expects. Bumped whenever
/// the table layout changes; `SqliteStore::open` runs `PRAGMA user_version`
/// migrations up to this value.
const SCHEMA_VERSION: i64 = 1;

/// Default `SQLite` busy timeout, in milliseconds, before a locked-database
/// write gives up and surfaces [`CoreError::Transient`].
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Width of the escalation dedup window, in seconds (see `spec.md` §4.6).
const ESCALATION_DEDUP_WINDOW_SECS: i64 = 24 * 60 * 60;

/// Errors produced opening or migrating the store, distinct from the
/// per-operation [`CoreError`] every trait method returns.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// The underlying `SQLite` connection could not be opened or configured.
    #[error("failed to open sqlite store at {path}: {source}")]
    Open {
        /// Path the store was opened against.
        path: String,
        /// Underlying `rusqlite` error.
        #[source]
        source: rusqlite::Error,
    },
    /// Schema creation or migration failed.
    #[error("failed to migrate sqlite schema: {0}")]
    Migration(#[source] rusqlite::Error),
}

/// Configuration for opening a [`SqliteStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteStoreConfig {
    /// Path to the database file. `:memory:` opens an in-process database,
    /// used by tests and by `caseflow-cli dry-run`.
    pub path: PathBuf,
    /// Busy-timeout applied to the connection, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl SqliteStoreConfig {
    /// Builds a file-backed configuration at `path` with the default busy
    /// timeout.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    /// Builds an in-memory configuration, used by tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::file(":memory:")
    }
}

/// A `SQLite`-backed implementation of every caseflow-core storage trait.
///
/// # Invariants
/// - One connection, guarded by a single `Mutex`; `SQLite`'s own WAL
///   concurrency is not exercised across multiple connections from this
///   process. Multi-process access relies on `SQLite`'s file locking plus
///   the configured busy timeout.
/// - Every table's `snapshot` column is the full, canonical JSON
///   serialization of the record; indexed columns exist only to narrow
///   `WHERE` clauses without deserializing every row.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    audit_sequence: AtomicU64,
}

impl SqliteStore {
    /// Opens (creating if necessary) a `SQLite` store at `config.path`,
    /// enables WAL journaling and the configured busy timeout, and runs
    /// schema migrations up to [`SCHEMA_VERSION`].
    ///
    /// # Errors
    /// Returns [`SqliteStoreError::Open`] if the connection cannot be
    /// opened or configured, [`SqliteStoreError::Migration`] if schema
    /// creation fails.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        let conn = Connection::open(&config.path).map_err(|source| SqliteStoreError::Open {
            path: config.path.display().to_string(),
            source,
        })?;
        conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
            .map_err(|source| SqliteStoreError::Open {
                path: config.path.display().to_string(),
                source,
            })?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|source| SqliteStoreError::Open {
                path: config.path.display().to_string(),
                source,
            })?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|source| SqliteStoreError::Open {
                path: config.path.display().to_string(),
                source,
            })?;
        migrate(&conn).map_err(SqliteStoreError::Migration)?;

        let next_sequence = conn
            .query_row("SELECT COALESCE(MAX(sequence), 0) FROM audit_entries", [], |row| {
                row.get::<_, i64>(0)
            })
            .unwrap_or(0);

        Ok(Self {
            conn: Mutex::new(conn),
            audit_sequence: AtomicU64::new(u64_from_i64(next_sequence)),
        })
    }

    /// Opens an in-memory store, used by tests and `caseflow-cli dry-run`.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] if schema creation fails.
    pub fn in_memory() -> Result<Self, SqliteStoreError> {
        Self::open(&SqliteStoreConfig::in_memory())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    let current_version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS gates (
            id INTEGER PRIMARY KEY,
            case_id TEXT NOT NULL,
            status TEXT NOT NULL,
            blocked INTEGER NOT NULL,
            created_at_unix INTEGER NOT NULL,
            snapshot TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_gates_status_age ON gates(status, created_at_unix);

        CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY,
            case_id TEXT NOT NULL,
            status TEXT NOT NULL,
            snapshot TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);

        CREATE TABLE IF NOT EXISTS escalations (
            id INTEGER PRIMARY KEY,
            case_number TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at_unix INTEGER NOT NULL,
            snapshot TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_escalations_case_number ON escalations(case_number, created_at_unix);

        CREATE TABLE IF NOT EXISTS exemplars (
            id INTEGER PRIMARY KEY,
            interaction_type TEXT NOT NULL,
            snapshot TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_exemplars_interaction_type ON exemplars(interaction_type);

        CREATE TABLE IF NOT EXISTS audit_entries (
            id INTEGER PRIMARY KEY,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            performed_at_unix INTEGER NOT NULL,
            sequence INTEGER NOT NULL,
            snapshot TEXT NOT NULL
        );
        ",
    )?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn u64_from_i64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn unix_seconds(at: Timestamp) -> i64 {
    at.as_offset_date_time().unix_timestamp()
}

fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

fn transient(operation: &'static str, err: rusqlite::Error) -> CoreError {
    CoreError::Transient {
        operation,
        detail: err.to_string(),
    }
}

fn invalid_snapshot(source: &'static str, err: serde_json::Error) -> CoreError {
    CoreError::InvalidResponse {
        source,
        detail: err.to_string(),
    }
}

// ============================================================================
// SECTION: GateStore
// ============================================================================

impl GateStore for SqliteStore {
    fn create(&self, mut record: QualityGateRecord) -> Result<QualityGateRecord, CoreError> {
        let conn = self.lock();
        let created_at_unix = unix_seconds(record.created_at);
        let case_id = record.case_id.as_str().to_string();
        let status = format!("{:?}", record.status);
        conn.execute(
            "INSERT INTO gates (case_id, status, blocked, created_at_unix, snapshot) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![case_id, status, i64::from(record.blocked), created_at_unix, "pending"],
        )
        .map_err(|err| transient("gate_store.create", err))?;
        let id = conn.last_insert_rowid();
        record.id = GateId::from_raw(u64_from_i64(id)).unwrap_or(record.id);

        let snapshot = serde_json::to_string(&record).map_err(|err| invalid_snapshot("gate_store", err))?;
        conn.execute(
            "UPDATE gates SET snapshot = ?1 WHERE id = ?2",
            params![snapshot, id],
        )
        .map_err(|err| transient("gate_store.create", err))?;
        Ok(record)
    }

    fn get(&self, id: GateId) -> Result<QualityGateRecord, CoreError> {
        let conn = self.lock();
        let snapshot: String = conn
            .query_row(
                "SELECT snapshot FROM gates WHERE id = ?1",
                params![i64::try_from(id.get()).unwrap_or(i64::MAX)],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| transient("gate_store.get", err))?
            .ok_or_else(|| CoreError::NotFound {
                entity: "gate",
                id: id.to_string(),
            })?;
        serde_json::from_str(&snapshot).map_err(|err| invalid_snapshot("gate_store", err))
    }

    fn update(&self, record: QualityGateRecord) -> Result<(), CoreError> {
        let conn = self.lock();
        let snapshot = serde_json::to_string(&record).map_err(|err| invalid_snapshot("gate_store", err))?;
        let status = format!("{:?}", record.status);
        let rows = conn
            .execute(
                "UPDATE gates SET status = ?1, blocked = ?2, snapshot = ?3 WHERE id = ?4",
                params![
                    status,
                    i64::from(record.blocked),
                    snapshot,
                    i64::try_from(record.id.get()).unwrap_or(i64::MAX)
                ],
            )
            .map_err(|err| transient("gate_store.update", err))?;
        if rows == 0 {
            return Err(CoreError::NotFound {
                entity: "gate",
                id: record.id.to_string(),
            });
        }
        Ok(())
    }

    fn find_blocked_older_than(&self, min_age_secs: u64) -> Result<Vec<QualityGateRecord>, CoreError> {
        let conn = self.lock();
        let threshold = now_unix() - i64::try_from(min_age_secs).unwrap_or(i64::MAX);
        let status = format!("{:?}", GateStatus::Blocked);
        let mut statement = conn
            .prepare("SELECT snapshot FROM gates WHERE status = ?1 AND created_at_unix <= ?2")
            .map_err(|err| transient("gate_store.find_blocked_older_than", err))?;
        let rows = statement
            .query_map(params![status, threshold], |row| row.get::<_, String>(0))
            .map_err(|err| transient("gate_store.find_blocked_older_than", err))?;

        let mut records = Vec::new();
        for row in rows {
            let snapshot = row.map_err(|err| transient("gate_store.find_blocked_older_than", err))?;
            records.push(serde_json::from_str(&snapshot).map_err(|err| invalid_snapshot("gate_store", err))?);
        }
        Ok(records)
    }

    fn rolling_24h_counts(&self) -> Result<(u64, u64, u64), CoreError> {
        let conn = self.lock();
        let threshold = now_unix() - ESCALATION_DEDUP_WINDOW_SECS;
        let approved = format!("{:?}", GateStatus::Approved);
        let blocked = format!("{:?}", GateStatus::Blocked);

        let approved_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM gates WHERE status = ?1 AND created_at_unix >= ?2",
                params![approved, threshold],
                |row| row.get(0),
            )
            .map_err(|err| transient("gate_store.rolling_24h_counts", err))?;
        let blocked_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM gates WHERE status = ?1 AND created_at_unix >= ?2",
                params![blocked, threshold],
                |row| row.get(0),
            )
            .map_err(|err| transient("gate_store.rolling_24h_counts", err))?;
        let total_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM gates WHERE created_at_unix >= ?1",
                params![threshold],
                |row| row.get(0),
            )
            .map_err(|err| transient("gate_store.rolling_24h_counts", err))?;

        Ok((
            u64_from_i64(approved_count),
            u64_from_i64(blocked_count),
            u64_from_i64(total_count),
        ))
    }
}

// ============================================================================
// SECTION: SessionStore
// ============================================================================

impl SessionStore for SqliteStore {
    fn create(&self, mut session: ClarificationSession) -> Result<ClarificationSession, CoreError> {
        let conn = self.lock();
        let case_id = session.case_id.as_str().to_string();
        let status = format!("{:?}", session.status);
        conn.execute(
            "INSERT INTO sessions (case_id, status, snapshot) VALUES (?1, ?2, ?3)",
            params![case_id, status, "pending"],
        )
        .map_err(|err| transient("session_store.create", err))?;
        let id = conn.last_insert_rowid();
        session.id = SessionId::from_raw(u64_from_i64(id)).unwrap_or(session.id);

        let snapshot = serde_json::to_string(&session).map_err(|err| invalid_snapshot("session_store", err))?;
        conn.execute("UPDATE sessions SET snapshot = ?1 WHERE id = ?2", params![snapshot, id])
            .map_err(|err| transient("session_store.create", err))?;
        Ok(session)
    }

    fn get(&self, id: SessionId) -> Result<ClarificationSession, CoreError> {
        let conn = self.lock();
        let snapshot: String = conn
            .query_row(
                "SELECT snapshot FROM sessions WHERE id = ?1",
                params![i64::try_from(id.get()).unwrap_or(i64::MAX)],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| transient("session_store.get", err))?
            .ok_or_else(|| CoreError::NotFound {
                entity: "session",
                id: id.to_string(),
            })?;
        serde_json::from_str(&snapshot).map_err(|err| invalid_snapshot("session_store", err))
    }

    fn update(&self, session: ClarificationSession) -> Result<(), CoreError> {
        let conn = self.lock();
        let snapshot = serde_json::to_string(&session).map_err(|err| invalid_snapshot("session_store", err))?;
        let status = format!("{:?}", session.status);
        let rows = conn
            .execute(
                "UPDATE sessions SET status = ?1, snapshot = ?2 WHERE id = ?3",
                params![status, snapshot, i64::try_from(session.id.get()).unwrap_or(i64::MAX)],
            )
            .map_err(|err| transient("session_store.update", err))?;
        if rows == 0 {
            return Err(CoreError::NotFound {
                entity: "session",
                id: session.id.to_string(),
            });
        }
        Ok(())
    }

    fn find_active(&self) -> Result<Vec<ClarificationSession>, CoreError> {
        let conn = self.lock();
        let status = format!("{:?}", caseflow_core::SessionStatus::Active);
        let mut statement = conn
            .prepare("SELECT snapshot FROM sessions WHERE status = ?1")
            .map_err(|err| transient("session_store.find_active", err))?;
        let rows = statement
            .query_map(params![status], |row| row.get::<_, String>(0))
            .map_err(|err| transient("session_store.find_active", err))?;

        let mut sessions = Vec::new();
        for row in rows {
            let snapshot = row.map_err(|err| transient("session_store.find_active", err))?;
            sessions.push(serde_json::from_str(&snapshot).map_err(|err| invalid_snapshot("session_store", err))?);
        }
        Ok(sessions)
    }
}

// ============================================================================
// SECTION: EscalationStore
// ============================================================================

impl EscalationStore for SqliteStore {
    fn create(&self, mut escalation: Escalation) -> Result<Escalation, CoreError> {
        let conn = self.lock();
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|err| transient("escalation_store.create", err))?;

        let threshold = now_unix() - ESCALATION_DEDUP_WINDOW_SECS;
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM escalations WHERE case_number = ?1 AND created_at_unix >= ?2 AND status IN ('Pending', 'Posted') LIMIT 1",
                params![escalation.case_number, threshold],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| transient("escalation_store.create", err))?;

        if existing.is_some() {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(CoreError::Conflict {
                entity: "escalation",
                detail: format!("active escalation already exists for case {}", escalation.case_number),
            });
        }

        let created_at_unix = unix_seconds(escalation.created_at);
        let status = format!("{:?}", escalation.status);
        let insert_result = conn.execute(
            "INSERT INTO escalations (case_number, status, created_at_unix, snapshot) VALUES (?1, ?2, ?3, ?4)",
            params![escalation.case_number, status, created_at_unix, "pending"],
        );
        let id = match insert_result {
            Ok(_) => conn.last_insert_rowid(),
            Err(err) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(transient("escalation_store.create", err));
            }
        };
        escalation.id = EscalationId::from_raw(u64_from_i64(id)).unwrap_or(escalation.id);

        let snapshot = match serde_json::to_string(&escalation) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(invalid_snapshot("escalation_store", err));
            }
        };
        if let Err(err) = conn.execute("UPDATE escalations SET snapshot = ?1 WHERE id = ?2", params![snapshot, id]) {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(transient("escalation_store.create", err));
        }

        conn.execute_batch("COMMIT")
            .map_err(|err| transient("escalation_store.create", err))?;
        Ok(escalation)
    }

    fn get(&self, id: EscalationId) -> Result<Escalation, CoreError> {
        let conn = self.lock();
        let snapshot: String = conn
            .query_row(
                "SELECT snapshot FROM escalations WHERE id = ?1",
                params![i64::try_from(id.get()).unwrap_or(i64::MAX)],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| transient("escalation_store.get", err))?
            .ok_or_else(|| CoreError::NotFound {
                entity: "escalation",
                id: id.to_string(),
            })?;
        serde_json::from_str(&snapshot).map_err(|err| invalid_snapshot("escalation_store", err))
    }

    fn update(&self, escalation: Escalation) -> Result<(), CoreError> {
        let conn = self.lock();
        let snapshot = serde_json::to_string(&escalation).map_err(|err| invalid_snapshot("escalation_store", err))?;
        let status = format!("{:?}", escalation.status);
        let rows = conn
            .execute(
                "UPDATE escalations SET status = ?1, snapshot = ?2 WHERE id = ?3",
                params![status, snapshot, i64::try_from(escalation.id.get()).unwrap_or(i64::MAX)],
            )
            .map_err(|err| transient("escalation_store.update", err))?;
        if rows == 0 {
            return Err(CoreError::NotFound {
                entity: "escalation",
                id: escalation.id.to_string(),
            });
        }
        Ok(())
    }

    fn find_active_for_case(&self, case_number: &str) -> Result<Option<Escalation>, CoreError> {
        let conn = self.lock();
        let threshold = now_unix() - ESCALATION_DEDUP_WINDOW_SECS;
        let snapshot: Option<String> = conn
            .query_row(
                "SELECT snapshot FROM escalations WHERE case_number = ?1 AND created_at_unix >= ?2 AND status IN ('Pending', 'Posted') ORDER BY created_at_unix DESC LIMIT 1",
                params![case_number, threshold],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| transient("escalation_store.find_active_for_case", err))?;
        snapshot
            .map(|snapshot| serde_json::from_str(&snapshot).map_err(|err| invalid_snapshot("escalation_store", err)))
            .transpose()
    }
}

// ============================================================================
// SECTION: ExemplarStore
// ============================================================================

impl ExemplarStore for SqliteStore {
    fn create(&self, mut exemplar: MuscleMemoryExemplar) -> Result<MuscleMemoryExemplar, CoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO exemplars (interaction_type, snapshot) VALUES (?1, ?2)",
            params![exemplar.interaction_type, "pending"],
        )
        .map_err(|err| transient("exemplar_store.create", err))?;
        let id = conn.last_insert_rowid();
        exemplar.id = ExemplarId::from_raw(u64_from_i64(id)).unwrap_or(exemplar.id);

        let snapshot = serde_json::to_string(&exemplar).map_err(|err| invalid_snapshot("exemplar_store", err))?;
        conn.execute("UPDATE exemplars SET snapshot = ?1 WHERE id = ?2", params![snapshot, id])
            .map_err(|err| transient("exemplar_store.create", err))?;
        Ok(exemplar)
    }

    fn update(&self, exemplar: MuscleMemoryExemplar) -> Result<(), CoreError> {
        let conn = self.lock();
        let snapshot = serde_json::to_string(&exemplar).map_err(|err| invalid_snapshot("exemplar_store", err))?;
        let rows = conn
            .execute(
                "UPDATE exemplars SET interaction_type = ?1, snapshot = ?2 WHERE id = ?3",
                params![exemplar.interaction_type, snapshot, i64::try_from(exemplar.id.get()).unwrap_or(i64::MAX)],
            )
            .map_err(|err| transient("exemplar_store.update", err))?;
        if rows == 0 {
            return Err(CoreError::NotFound {
                entity: "exemplar",
                id: exemplar.id.to_string(),
            });
        }
        Ok(())
    }

    fn candidates(&self, interaction_type: Option<&str>) -> Result<Vec<MuscleMemoryExemplar>, CoreError> {
        let conn = self.lock();
        let mut exemplars = Vec::new();
        if let Some(interaction_type) = interaction_type {
            let mut statement = conn
                .prepare("SELECT snapshot FROM exemplars WHERE interaction_type = ?1")
                .map_err(|err| transient("exemplar_store.candidates", err))?;
            let rows = statement
                .query_map(params![interaction_type], |row| row.get::<_, String>(0))
                .map_err(|err| transient("exemplar_store.candidates", err))?;
            for row in rows {
                let snapshot = row.map_err(|err| transient("exemplar_store.candidates", err))?;
                exemplars
                    .push(serde_json::from_str(&snapshot).map_err(|err| invalid_snapshot("exemplar_store", err))?);
            }
        } else {
            let mut statement = conn
                .prepare("SELECT snapshot FROM exemplars")
                .map_err(|err| transient("exemplar_store.candidates", err))?;
            let rows = statement
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|err| transient("exemplar_store.candidates", err))?;
            for row in rows {
                let snapshot = row.map_err(|err| transient("exemplar_store.candidates", err))?;
                exemplars
                    .push(serde_json::from_str(&snapshot).map_err(|err| invalid_snapshot("exemplar_store", err))?);
            }
        }
        Ok(exemplars)
    }
}

// ============================================================================
// SECTION: AuditSink
// ============================================================================

impl AuditSink for SqliteStore {
    fn append(&self, mut entry: AuditEntry) -> Result<AuditEntry, CoreError> {
        let sequence = self.audit_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        entry.sequence = sequence;

        let conn = self.lock();
        let performed_at_unix = unix_seconds(entry.performed_at);
        conn.execute(
            "INSERT INTO audit_entries (entity_type, entity_id, performed_at_unix, sequence, snapshot) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![entry.entity_type, entry.entity_id, performed_at_unix, i64::try_from(sequence).unwrap_or(i64::MAX), "pending"],
        )
        .map_err(|err| transient("audit_sink.append", err))?;
        let id = conn.last_insert_rowid();
        entry.id = AuditEntryId::from_raw(u64_from_i64(id)).unwrap_or(entry.id);

        let snapshot = serde_json::to_string(&entry).map_err(|err| invalid_snapshot("audit_sink", err))?;
        conn.execute("UPDATE audit_entries SET snapshot = ?1 WHERE id = ?2", params![snapshot, id])
            .map_err(|err| transient("audit_sink.append", err))?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use caseflow_core::{RiskLevel, SessionStatus};

    use super::*;

    fn gate(case_id: &str, status: GateStatus, created_at: Timestamp) -> QualityGateRecord {
        QualityGateRecord {
            id: GateId::new(NonZeroU64::MIN),
            case_id: CaseId::new(case_id),
            status,
            blocked: status == GateStatus::Blocked,
            risk_level: RiskLevel::Low,
            reviewer_id: None,
            review_reason: None,
            created_at,
            reviewed_at: None,
            decision_payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn gate_round_trips_through_create_and_get() {
        let store = SqliteStore::in_memory().expect("open");
        let created = store.create(gate("c-1", GateStatus::New, Timestamp::now())).expect("create");
        let fetched = store.get(created.id).expect("get");
        assert_eq!(fetched.case_id, created.case_id);
        assert_eq!(fetched.status, GateStatus::New);
    }

    #[test]
    fn find_blocked_older_than_filters_by_age() {
        let store = SqliteStore::in_memory().expect("open");
        let old = Timestamp::new(OffsetDateTime::now_utc() - time::Duration::hours(30));
        let recent = Timestamp::now();
        store.create(gate("old", GateStatus::Blocked, old)).expect("create");
        store.create(gate("recent", GateStatus::Blocked, recent)).expect("create");

        let stuck = store.find_blocked_older_than(24 * 60 * 60).expect("query");
        assert_eq!(stuck.len(), 1);
        assert_eq!(stuck[0].case_id, CaseId::new("old"));
    }

    #[test]
    fn escalation_create_rejects_duplicate_within_window() {
        let store = SqliteStore::in_memory().expect("open");
        let escalation = Escalation {
            id: EscalationId::new(NonZeroU64::MIN),
            case_number: "CS0001".to_string(),
            triggers: vec![],
            bi_score: 0.9,
            routing_rule_name: "default".to_string(),
            channel: "C1".to_string(),
            slack_message: None,
            status: EscalationStatus::Pending,
            created_at: Timestamp::now(),
            acknowledged_at: None,
        };
        store.create(escalation.clone()).expect("first create succeeds");
        let err = store.create(escalation).expect_err("dedup should reject");
        assert!(matches!(err, CoreError::Conflict { .. }));
    }

    #[test]
    fn session_find_active_only_returns_active_sessions() {
        let store = SqliteStore::in_memory().expect("open");
        let session = ClarificationSession {
            id: SessionId::new(NonZeroU64::MIN),
            case_id: CaseId::new("c-1"),
            case_number: "CS0001".to_string(),
            questions: vec![],
            responses: std::collections::BTreeMap::new(),
            expires_at: Timestamp::now(),
            status: SessionStatus::Active,
            slack_channel: None,
            slack_thread_ts: None,
            linked_gate_id: GateId::new(NonZeroU64::MIN),
            reminders_sent: 0,
        };
        let created = store.create(session).expect("create");
        assert_eq!(store.find_active().expect("query").len(), 1);

        let mut resolved = created;
        resolved.status = SessionStatus::Cancelled;
        store.update(resolved).expect("update");
        assert_eq!(store.find_active().expect("query").len(), 0);
    }

    #[test]
    fn audit_entries_get_monotonic_sequence() {
        let store = SqliteStore::in_memory().expect("open");
        let base = AuditEntry {
            id: AuditEntryId::new(NonZeroU64::MIN),
            entity_type: "gate".to_string(),
            entity_id: "1".to_string(),
            action: "approved".to_string(),
            prior_state: None,
            new_state: serde_json::Value::Null,
            reason: None,
            actor: "validator".to_string(),
            performed_at: Timestamp::now(),
            metadata: serde_json::Value::Null,
            sequence: 0,
        };
        let first = store.append(base.clone()).expect("append");
        let second = store.append(base).expect("append");
        assert!(second.sequence > first.sequence);
    }
}
