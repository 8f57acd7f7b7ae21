// crates/caseflow-store-sqlite/src/lib.rs
// ============================================================================
// Module: Caseflow SQLite Store
// Description: Durable SQLite-backed implementations of every storage trait
//              caseflow-core defines: gates, clarification sessions,
//              escalations, muscle-memory exemplars, and the audit sink.
// Purpose: Give the server and CLI one concrete, file-backed store for local
//          and single-node deployments, without forcing every downstream
//          crate to depend on rusqlite directly.
// Dependencies: caseflow-core, rusqlite, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! [`SqliteStore`] wraps one `rusqlite::Connection` behind a `Mutex` and
//! implements [`caseflow_core::GateStore`], [`caseflow_core::SessionStore`],
//! [`caseflow_core::EscalationStore`], [`caseflow_core::ExemplarStore`], and
//! [`caseflow_core::AuditSink`]. Every table stores its full record as a
//! canonical JSON snapshot column alongside the handful of indexed columns
//! each trait's query methods need (status, case id, timestamps) — the
//! snapshot is the source of truth, the indexed columns exist only to avoid
//! deserializing every row to answer `find_blocked_older_than` or
//! `find_active_for_case`.

mod store;

pub use store::{SqliteStore, SqliteStoreConfig, SqliteStoreError};
