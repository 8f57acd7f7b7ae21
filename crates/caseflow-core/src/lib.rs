// crates/caseflow-core/src/lib.rs
// ============================================================================
// Module: Caseflow Core
// Description: Shared data model, identifiers, and repository/provider trait
//              surfaces for the Case Intake & Orchestration Engine.
// Purpose: Give every downstream crate (rules, config, providers, pipeline,
//          validator, clarification, escalation, monitor, server, cli) one
//          canonical, backend-agnostic vocabulary to build against.
// Dependencies: serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! `caseflow-core` has no I/O of its own. It defines the types that flow
//! between every other crate in the workspace and the traits ("seams") that
//! decouple the orchestration logic from any particular ServiceNow, Slack,
//! LLM, or storage backend. Concrete implementations of these traits live in
//! `caseflow-providers`, `caseflow-store-sqlite`, and `caseflow-broker`.

pub mod core;
pub mod interfaces;

pub use core::identifiers::{
    AuditEntryId, CaseId, CorrelationId, EscalationId, ExemplarId, GateId, QuestionId, SessionId,
    TenantId,
};
pub use core::model::{
    AuditEntry, BiFlag, BusinessContext, BusinessIntelligence, Case, CaseClassification,
    ClarificationSession, ContextPack, EMBEDDING_DIMENSIONS, Escalation, EscalationStatus,
    EscalationTrigger, GateStatus, KbArticle, MuscleMemoryExemplar, Narrative, NarrativeTone,
    QualityGateRecord, QualitySignals, QuestionSpec, RecordTypeKind, RecordTypeSuggestion,
    RiskLevel, SessionError, SessionStatus, SimilarCase, SlackMessageRef, TechnicalEntities,
    Urgency,
};
pub use core::time::Timestamp;
pub use interfaces::{
    AuditSink, BusinessContextRepository, CaseRepository, CoreError, EmbeddingClient,
    EscalationStore, ExemplarStore, GateStore, KnowledgeBaseRepository, LlmClient,
    ServiceNowClient, SessionStore, SimilarCaseRepository, SlackClient, TaskQueue,
};
