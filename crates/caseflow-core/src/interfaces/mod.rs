// crates/caseflow-core/src/interfaces/mod.rs
// ============================================================================
// Module: Caseflow Interfaces
// Description: Backend-agnostic trait seams for every external system the
//              orchestration engine talks to.
// Purpose: Let `caseflow-pipeline`, `caseflow-validator`,
//          `caseflow-clarification`, `caseflow-escalation`, and
//          `caseflow-monitor` depend on behavior, not on a specific
//          ServiceNow/Slack/SQLite/HTTP implementation. Concrete
//          implementations live in `caseflow-providers`,
//          `caseflow-store-sqlite`, and `caseflow-broker`.
// Dependencies: async-trait is intentionally NOT a dependency of this crate;
//               trait methods return boxed futures would require it, so
//               instead every trait here is `#[async_trait::async_trait]`
//               in the crates that *implement* and *consume* it, via a
//               re-exported marker trait. See `caseflow-pipeline` and
//               `caseflow-providers` for the async_trait impls.
// ============================================================================

//! ## Overview
//! Every fallible operation in this module returns [`CoreError`], the single
//! error taxonomy every provider, store, and client normalizes into at its
//! boundary. A ServiceNow HTTP timeout, a SQLite busy error, and an LLM
//! content-policy rejection all surface to callers as the same small set of
//! variants — callers branch on *kind*, not on backend.

use thiserror::Error;

use crate::core::identifiers::{CaseId, EscalationId, ExemplarId, GateId, SessionId};
use crate::core::model::{
    AuditEntry, BusinessContext, Case, ClarificationSession, Escalation, KbArticle,
    MuscleMemoryExemplar, QualityGateRecord, SimilarCase,
};

/// The shared error taxonomy every trait in this module normalizes into.
///
/// Implementations (HTTP adapters, SQLite stores, in-process fallbacks)
/// translate their own backend errors into one of these variants at the
/// boundary; callers never match on a backend-specific error type.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of entity that was looked up (e.g. `"case"`, `"gate"`).
        entity: &'static str,
        /// The id that was looked up, rendered as a string.
        id: String,
    },
    /// The backend took longer than its configured deadline.
    #[error("{operation} timed out after {elapsed_ms} ms")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// Elapsed time before the deadline fired, in milliseconds.
        elapsed_ms: u64,
    },
    /// The backend rejected the request as unauthorized or forbidden.
    #[error("{0} rejected the request as unauthorized")]
    Unauthorized(&'static str),
    /// The backend returned a response this client could not parse or
    /// validate.
    #[error("invalid response from {source}: {detail}")]
    InvalidResponse {
        /// The backend that returned the response.
        source: &'static str,
        /// What was wrong with it.
        detail: String,
    },
    /// A transient failure occurred; the caller may retry.
    #[error("transient failure calling {operation}: {detail}")]
    Transient {
        /// The operation that failed.
        operation: &'static str,
        /// Underlying detail.
        detail: String,
    },
    /// A write was rejected because it violated a uniqueness or ordering
    /// invariant the store enforces (e.g. a duplicate escalation within the
    /// dedup window).
    #[error("conflict writing {entity}: {detail}")]
    Conflict {
        /// Kind of entity the conflicting write targeted.
        entity: &'static str,
        /// Description of the conflict.
        detail: String,
    },
}

/// Read-through access to ServiceNow cases.
pub trait CaseRepository: Send + Sync {
    /// Loads a case by id.
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if the case does not exist,
    /// [`CoreError::Timeout`] or [`CoreError::Transient`] on backend
    /// failure.
    fn get_case(&self, id: &CaseId) -> Result<Case, CoreError>;

    /// Appends a ServiceNow work note to a case.
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if the case does not exist,
    /// [`CoreError::Transient`] on backend failure.
    fn append_work_note(&self, id: &CaseId, note: &str) -> Result<(), CoreError>;

    /// Updates a case's category and ServiceNow record type fields following
    /// a validator decision.
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if the case does not exist,
    /// [`CoreError::Transient`] on backend failure.
    fn apply_classification(
        &self,
        id: &CaseId,
        category: &str,
        subcategory: Option<&str>,
    ) -> Result<(), CoreError>;
}

/// Resolves business-entity (account/company) context for a case.
pub trait BusinessContextRepository: Send + Sync {
    /// Looks up business context for `company_or_account`.
    ///
    /// # Errors
    /// Returns [`CoreError::Timeout`] or [`CoreError::Transient`] on
    /// backend failure. Absence of context is `Ok(None)`, not an error.
    fn lookup(&self, company_or_account: &str) -> Result<Option<BusinessContext>, CoreError>;
}

/// Finds prior cases similar to the one being processed.
pub trait SimilarCaseRepository: Send + Sync {
    /// Returns up to `limit` similar cases for `case`.
    ///
    /// # Errors
    /// Returns [`CoreError::Timeout`] or [`CoreError::Transient`] on
    /// backend failure.
    fn find_similar(&self, case: &Case, limit: usize) -> Result<Vec<SimilarCase>, CoreError>;
}

/// Searches the knowledge base for articles relevant to a case.
pub trait KnowledgeBaseRepository: Send + Sync {
    /// Returns up to `limit` knowledge-base articles relevant to `case`.
    ///
    /// # Errors
    /// Returns [`CoreError::Timeout`] or [`CoreError::Transient`] on
    /// backend failure.
    fn search(&self, case: &Case, limit: usize) -> Result<Vec<KbArticle>, CoreError>;
}

/// Durable storage for [`QualityGateRecord`]s.
pub trait GateStore: Send + Sync {
    /// Persists a newly created gate record, assigning its id.
    ///
    /// # Errors
    /// Returns [`CoreError::Transient`] on backend failure.
    fn create(&self, record: QualityGateRecord) -> Result<QualityGateRecord, CoreError>;

    /// Loads a gate record by id.
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if no such record exists.
    fn get(&self, id: GateId) -> Result<QualityGateRecord, CoreError>;

    /// Persists an updated gate record (status transition, review fields).
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if no such record exists,
    /// [`CoreError::Transient`] on backend failure.
    fn update(&self, record: QualityGateRecord) -> Result<(), CoreError>;

    /// Returns every gate currently `blocked` and older than `min_age_secs`,
    /// used by the stuck-case monitor.
    ///
    /// # Errors
    /// Returns [`CoreError::Transient`] on backend failure.
    fn find_blocked_older_than(&self, min_age_secs: u64) -> Result<Vec<QualityGateRecord>, CoreError>;

    /// Returns `(approved_count, blocked_count, total_count)` over the last
    /// 24 hours, used for the rolling approval/block rate metric.
    ///
    /// # Errors
    /// Returns [`CoreError::Transient`] on backend failure.
    fn rolling_24h_counts(&self) -> Result<(u64, u64, u64), CoreError>;
}

/// Durable storage for [`ClarificationSession`]s.
pub trait SessionStore: Send + Sync {
    /// Persists a newly created session, assigning its id.
    ///
    /// # Errors
    /// Returns [`CoreError::Transient`] on backend failure.
    fn create(&self, session: ClarificationSession) -> Result<ClarificationSession, CoreError>;

    /// Loads a session by id.
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if no such session exists.
    fn get(&self, id: SessionId) -> Result<ClarificationSession, CoreError>;

    /// Persists an updated session (responses, status transitions).
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if no such session exists,
    /// [`CoreError::Transient`] on backend failure.
    fn update(&self, session: ClarificationSession) -> Result<(), CoreError>;

    /// Returns every `ACTIVE` session, used by the 15-minute expiry sweep.
    ///
    /// # Errors
    /// Returns [`CoreError::Transient`] on backend failure.
    fn find_active(&self) -> Result<Vec<ClarificationSession>, CoreError>;
}

/// Durable storage for [`Escalation`] records.
pub trait EscalationStore: Send + Sync {
    /// Persists a newly created escalation, assigning its id.
    ///
    /// # Errors
    /// Returns [`CoreError::Conflict`] if an active escalation already
    /// exists for the same case number within the dedup window,
    /// [`CoreError::Transient`] on backend failure.
    fn create(&self, escalation: Escalation) -> Result<Escalation, CoreError>;

    /// Loads an escalation by id.
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if no such escalation exists.
    fn get(&self, id: EscalationId) -> Result<Escalation, CoreError>;

    /// Persists an updated escalation (status transitions, Slack message
    /// coordinates).
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if no such escalation exists,
    /// [`CoreError::Transient`] on backend failure.
    fn update(&self, escalation: Escalation) -> Result<(), CoreError>;

    /// Returns the active (non-terminal) escalation for `case_number` within
    /// the last 24 hours, if one exists.
    ///
    /// # Errors
    /// Returns [`CoreError::Transient`] on backend failure.
    fn find_active_for_case(&self, case_number: &str) -> Result<Option<Escalation>, CoreError>;
}

/// Durable storage for [`MuscleMemoryExemplar`]s.
pub trait ExemplarStore: Send + Sync {
    /// Persists a newly created exemplar, assigning its id.
    ///
    /// # Errors
    /// Returns [`CoreError::Transient`] on backend failure.
    fn create(&self, exemplar: MuscleMemoryExemplar) -> Result<MuscleMemoryExemplar, CoreError>;

    /// Persists an updated exemplar (quality-score refresh on dedup match).
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if no such exemplar exists,
    /// [`CoreError::Transient`] on backend failure.
    fn update(&self, exemplar: MuscleMemoryExemplar) -> Result<(), CoreError>;

    /// Returns exemplars for `interaction_type` (or all, if `None`) as
    /// candidates for cosine-similarity ranking. Ranking and filtering by
    /// distance/quality threshold is the caller's (`caseflow-pipeline`'s)
    /// responsibility; the store only narrows by interaction type.
    ///
    /// # Errors
    /// Returns [`CoreError::Transient`] on backend failure.
    fn candidates(
        &self,
        interaction_type: Option<&str>,
    ) -> Result<Vec<MuscleMemoryExemplar>, CoreError>;
}

/// Append-only sink for [`AuditEntry`] records.
pub trait AuditSink: Send + Sync {
    /// Appends an audit entry, assigning its id and sequence number.
    ///
    /// # Errors
    /// Returns [`CoreError::Transient`] on backend failure. A failed audit
    /// write must never fail the primary operation it describes; callers
    /// are expected to treat this as best-effort and discard the error
    /// rather than propagate it.
    fn append(&self, entry: AuditEntry) -> Result<AuditEntry, CoreError>;
}

/// A chat-completion call against a large language model, used by every
/// classification-pipeline stage.
pub trait LlmClient: Send + Sync {
    /// Runs one classification-pipeline stage's prompt against the model.
    ///
    /// `temperature` and `system_prompt` are passed through verbatim;
    /// `user_prompt` is the stage's rendered context + instructions.
    /// Returns the model's raw text completion; JSON extraction and schema
    /// validation are the caller's (`caseflow-pipeline`'s) responsibility.
    ///
    /// # Errors
    /// Returns [`CoreError::Timeout`] if the model did not respond within
    /// the stage deadline, [`CoreError::Transient`] on backend failure.
    fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<String, CoreError>;
}

/// Computes vector embeddings for the muscle-memory retriever.
pub trait EmbeddingClient: Send + Sync {
    /// Returns a [`crate::core::model::EMBEDDING_DIMENSIONS`]-length
    /// embedding for `text`.
    ///
    /// # Errors
    /// Returns [`CoreError::Timeout`] or [`CoreError::Transient`] on
    /// backend failure.
    fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError>;
}

/// Outbound Slack operations used by the dispatcher, clarification FSM, and
/// escalation router.
pub trait SlackClient: Send + Sync {
    /// Posts a message (optionally as a thread reply) and returns its
    /// `(channel, ts)` coordinates.
    ///
    /// # Errors
    /// Returns [`CoreError::Unauthorized`] if the bot token is rejected,
    /// [`CoreError::Transient`] on backend failure.
    fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        blocks: serde_json::Value,
    ) -> Result<(String, String), CoreError>;

    /// Verifies an inbound Slack request's `X-Slack-Signature` header
    /// against the raw request body.
    ///
    /// # Errors
    /// Returns [`CoreError::Unauthorized`] if the signature does not match.
    fn verify_signature(
        &self,
        timestamp: &str,
        raw_body: &[u8],
        signature: &str,
    ) -> Result<(), CoreError>;
}

/// Outbound ServiceNow operations beyond the read-through
/// [`CaseRepository`] (CMDB lookups specifically).
pub trait ServiceNowClient: Send + Sync {
    /// Looks up a configuration item by name.
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if no such CI exists,
    /// [`CoreError::Transient`] on backend failure.
    fn lookup_configuration_item(&self, name: &str) -> Result<serde_json::Value, CoreError>;

    /// Verifies an inbound ServiceNow webhook request's authentication,
    /// either bearer token or HMAC signature depending on configuration.
    ///
    /// # Errors
    /// Returns [`CoreError::Unauthorized`] if authentication fails.
    fn verify_request(
        &self,
        headers: &std::collections::HashMap<String, String>,
        raw_body: &[u8],
    ) -> Result<(), CoreError>;
}

/// Durable job queue the Intake Dispatcher publishes onto and workers
/// consume from.
pub trait TaskQueue: Send + Sync {
    /// Publishes a job. `idempotency_key` is `{case_id}:{stage}`, carried
    /// through unchanged so the worker never re-derives it.
    ///
    /// # Errors
    /// Returns [`CoreError::Transient`] if the queue is unavailable; a
    /// failure here must not be treated as a dedup side effect by the
    /// caller.
    fn publish(&self, idempotency_key: &str, payload: serde_json::Value) -> Result<(), CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_error_messages_are_stable() {
        let err = CoreError::NotFound {
            entity: "case",
            id: "c-1".to_string(),
        };
        assert_eq!(err.to_string(), "case c-1 not found");
    }
}
