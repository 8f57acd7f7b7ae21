// crates/caseflow-core/src/core/model.rs
// ============================================================================
// Module: Caseflow Data Model
// Description: The entities that flow through intake, classification,
//              validation, clarification, escalation, and monitoring.
// Purpose: One shared, strongly typed vocabulary for every downstream crate.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Entities here mirror the domain's own invariants as closely as the type
//! system allows: enrichment sections in a [`ContextPack`] are either fully
//! present or entirely absent, [`ClarificationSession::record_response`]
//! refuses answers to questions the session never asked, and status enums
//! only expose the values their owning state machine can actually produce.
//! None of these types perform I/O; they are built and mutated by
//! `caseflow-pipeline`, `caseflow-validator`, `caseflow-clarification`, and
//! `caseflow-escalation`.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use super::identifiers::{CaseId, EscalationId, ExemplarId, GateId, QuestionId, SessionId};
use super::time::Timestamp;

/// Embedding dimensionality used by the muscle-memory retriever and by every
/// `EmbeddingClient` implementation.
pub const EMBEDDING_DIMENSIONS: usize = 1536;

// ============================================================================
// SECTION: Case (external, read-through)
// ============================================================================

/// A ServiceNow case, read through [`crate::CaseRepository`]. Core never
/// deletes this; ServiceNow owns its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    /// Stable ServiceNow `sys_id`.
    pub id: CaseId,
    /// Human-facing case number, e.g. `CS0012345`.
    pub number: String,
    /// One-line description.
    pub short_description: String,
    /// Full description body, if the case has one.
    pub long_description: Option<String>,
    /// ServiceNow priority (1 = highest).
    pub priority: u8,
    /// ServiceNow urgency (1 = highest).
    pub urgency: u8,
    /// Company the case was opened under.
    pub company: String,
    /// Assignment group sys_id or name.
    pub assignment_group: Option<String>,
    /// Account sys_id or name, for business-account cases.
    pub account: Option<String>,
    /// Current category as set on the ServiceNow record, prior to our
    /// classification.
    pub current_category: Option<String>,
}

// ============================================================================
// SECTION: Context Pack (ephemeral, per pipeline run)
// ============================================================================

/// Resolved business-entity context for the account/company on a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessContext {
    /// Account or company display name.
    pub entity_name: String,
    /// Tier or segment, e.g. `"enterprise"`, `"smb"`.
    pub tier: Option<String>,
    /// Whether the entity carries a compliance or regulatory flag.
    pub compliance_sensitive: bool,
    /// Free-form notes surfaced from the business-context repository.
    pub notes: Option<String>,
}

/// A previously closed case considered similar to the one being processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarCase {
    /// The prior case's number.
    pub case_number: String,
    /// Short description of the prior case.
    pub short_description: String,
    /// Resolution summary, if recorded.
    pub resolution_summary: Option<String>,
    /// Similarity score in `[0, 1]`, higher is closer.
    pub similarity: f32,
}

/// A knowledge-base article surfaced as potentially relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KbArticle {
    /// KB article's stable identifier.
    pub article_id: String,
    /// Article title.
    pub title: String,
    /// Short excerpt or summary.
    pub excerpt: String,
}

/// Ephemeral enrichment bundle assembled by the Context Loader for a single
/// pipeline run. Never persisted; rebuilt on every classification attempt.
///
/// # Invariants
/// - `similar_cases`, `kb_articles`, and `exemplars` each hold at most 3
///   entries.
/// - Each enrichment section is either fully populated or `None` — a
///   partial section (e.g. a business-context fetch that returned but with
///   some fields missing) is represented as `Some` with those fields
///   optional *within* the section, never as a truncated `Vec`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPack {
    /// The case snapshot this pack was built for.
    pub case: Case,
    /// Resolved business-entity context, if the repository had one.
    pub business_context: Option<BusinessContext>,
    /// Up to 3 similar prior cases.
    pub similar_cases: Vec<SimilarCase>,
    /// Up to 3 relevant knowledge-base articles.
    pub kb_articles: Vec<KbArticle>,
    /// Up to 3 muscle-memory exemplars biasing classification.
    pub exemplars: Vec<MuscleMemoryExemplar>,
}

impl ContextPack {
    /// Maximum number of rows any enrichment section may carry.
    pub const MAX_ENRICHMENT_ROWS: usize = 3;

    /// Builds a bare context pack with no enrichment, for the case where
    /// every optional fetch failed or returned nothing.
    #[must_use]
    pub fn bare(case: Case) -> Self {
        Self {
            case,
            business_context: None,
            similar_cases: Vec::new(),
            kb_articles: Vec::new(),
            exemplars: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Classification Result
// ============================================================================

/// Urgency bucket assigned by the categorization stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    /// Routine request, no time pressure.
    Low,
    /// Normal priority handling.
    Medium,
    /// Needs prompt attention.
    High,
    /// Business-impacting, needs immediate attention.
    Critical,
}

/// Record type the categorization stage believes this case should become.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordTypeKind {
    /// A one-off incident.
    Incident,
    /// A recurring or systemic problem.
    Problem,
    /// A planned infrastructure or application change.
    Change,
    /// Stays a plain case/request.
    Case,
}

/// The categorization stage's opinion on what ServiceNow record type this
/// case should be promoted to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordTypeSuggestion {
    /// Suggested record type.
    pub kind: RecordTypeKind,
    /// Whether this is a major occurrence of that type (e.g. major incident).
    pub is_major: bool,
    /// Free-text justification grounded in the case text.
    pub reasoning: String,
}

/// Technical entities extracted from the case text, used both for
/// classification context and for downstream search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalEntities {
    /// IPv4/IPv6 addresses mentioned in the case.
    pub ip_addresses: Vec<String>,
    /// Named systems, hosts, or applications mentioned.
    pub systems: Vec<String>,
    /// Usernames or account identifiers mentioned.
    pub users: Vec<String>,
    /// Named software products or packages mentioned.
    pub software: Vec<String>,
    /// Error codes or exception identifiers mentioned.
    pub error_codes: Vec<String>,
}

/// Tone of the drafted narrative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeTone {
    /// The case can be handled with a clear, confident next step.
    Confident,
    /// The next step is plausible but warrants a human's sign-off.
    Cautious,
    /// The narrative stage itself recommends escalation.
    Escalate,
}

/// Narrative stage output: a human-readable summary and action plan.
///
/// # Invariants
/// - `immediate_next_steps` has between 1 and 5 entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    /// Two-to-three sentence plain-language summary of the case.
    pub quick_summary: String,
    /// Ordered, concrete next steps (commands or paths where applicable).
    pub immediate_next_steps: Vec<String>,
    /// Overall tone the narrative stage assigned.
    pub tone: NarrativeTone,
}

impl Narrative {
    /// Minimum number of next-step entries.
    pub const MIN_NEXT_STEPS: usize = 1;
    /// Maximum number of next-step entries.
    pub const MAX_NEXT_STEPS: usize = 5;

    /// Returns `true` if `immediate_next_steps` satisfies the `1..=5` length
    /// invariant.
    #[must_use]
    pub fn has_valid_step_count(&self) -> bool {
        (Self::MIN_NEXT_STEPS..=Self::MAX_NEXT_STEPS).contains(&self.immediate_next_steps.len())
    }
}

/// A single boolean business-intelligence flag with an optional reason.
///
/// # Invariants
/// - When `flagged` is `true`, `reason` should be `Some`; the validator
///   treats a flagged-without-reason signal as a BI-consistency error, but
///   the type itself does not forbid the combination (the evidence a stage
///   can cite varies by flag).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BiFlag {
    /// Whether the flag fired.
    pub flagged: bool,
    /// Evidence-grounded reason, when `flagged` is true.
    pub reason: Option<String>,
}

impl BiFlag {
    /// A flag that did not fire.
    #[must_use]
    pub const fn clear() -> Self {
        Self {
            flagged: false,
            reason: None,
        }
    }

    /// A flag that fired, with its supporting reason.
    #[must_use]
    pub fn set(reason: impl Into<String>) -> Self {
        Self {
            flagged: true,
            reason: Some(reason.into()),
        }
    }
}

/// Business-intelligence flags derived from evidence in the case text, never
/// from speculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessIntelligence {
    /// This case touches scoped project work rather than routine support.
    pub project_scope_detected: BiFlag,
    /// An executive or VIP stakeholder is visibly involved.
    pub executive_visibility: BiFlag,
    /// Regulatory or contractual compliance is implicated.
    pub compliance_impact: BiFlag,
    /// Material financial exposure is implicated.
    pub financial_impact: BiFlag,
    /// The case looks like a symptom of a systemic, recurring issue.
    pub systemic_issue: BiFlag,
    /// The case arrived outside the account's contracted service hours.
    pub outside_service_hours: BiFlag,
}

impl BusinessIntelligence {
    /// Returns every flag currently set to `flagged = true`.
    #[must_use]
    pub fn flagged_iter(&self) -> impl Iterator<Item = (&'static str, &BiFlag)> {
        [
            ("project_scope_detected", &self.project_scope_detected),
            ("executive_visibility", &self.executive_visibility),
            ("compliance_impact", &self.compliance_impact),
            ("financial_impact", &self.financial_impact),
            ("systemic_issue", &self.systemic_issue),
            ("outside_service_hours", &self.outside_service_hours),
        ]
        .into_iter()
        .filter(|(_, flag)| flag.flagged)
    }

    /// Count of flags currently set, used by the composite BI score.
    #[must_use]
    pub fn flagged_count(&self) -> usize {
        self.flagged_iter().count()
    }
}

/// The full output of the three-stage classification pipeline.
///
/// # Invariants
/// - `category` is always present; every other field may be absent when the
///   corresponding stage did not populate it.
/// - `confidence`, if present, is finite and within `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseClassification {
    /// Primary category (required output of the categorization stage).
    pub category: String,
    /// Subcategory, if the categorization stage chose one.
    pub subcategory: Option<String>,
    /// ServiceNow incident category, if record type was promoted.
    pub incident_category: Option<String>,
    /// ServiceNow incident subcategory, if record type was promoted.
    pub incident_subcategory: Option<String>,
    /// Categorization-stage confidence in `[0, 1]`.
    pub confidence: Option<f32>,
    /// Extracted keywords.
    pub keywords: Vec<String>,
    /// Extracted technical entities.
    pub technical_entities: TechnicalEntities,
    /// Assigned urgency.
    pub urgency: Urgency,
    /// Suggested ServiceNow record type.
    pub record_type_suggestion: RecordTypeSuggestion,
    /// Suggested service offering.
    pub service_offering: Option<String>,
    /// Suggested application service (CMDB CI).
    pub application_service: Option<String>,
    /// Narrative-stage output.
    pub narrative: Narrative,
    /// Business-intelligence-stage output.
    pub business_intelligence: BusinessIntelligence,
}

impl CaseClassification {
    /// Returns `true` if `confidence` is present, finite, and in `[0, 1]`.
    #[must_use]
    pub fn has_valid_confidence(&self) -> bool {
        match self.confidence {
            None => true,
            Some(value) => value.is_finite() && (0.0..=1.0).contains(&value),
        }
    }
}

// ============================================================================
// SECTION: Quality Gate Record
// ============================================================================

/// Status of a [`QualityGateRecord`].
///
/// # Invariants
/// - Transitions are enforced by `caseflow-validator`'s state machine, not
///   by this type; see `caseflow_validator::transition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateStatus {
    /// Freshly created, not yet evaluated.
    New,
    /// Passed validation with no blocking errors.
    Approved,
    /// Explicitly rejected by a human reviewer.
    Rejected,
    /// Soft issues require a clarification session before re-evaluation.
    ClarificationNeeded,
    /// The linked clarification session expired without resolution.
    Expired,
    /// Hard errors prevent approval.
    Blocked,
}

impl GateStatus {
    /// Returns `true` for statuses the state machine treats as terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Expired)
    }
}

/// Risk level attached to a gate record, used by the stuck-case monitor and
/// escalation router to prioritize attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// No elevated risk.
    Low,
    /// Some risk signals present.
    Medium,
    /// Compliance, financial, or executive risk signals present.
    High,
}

/// A quality-gate decision record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGateRecord {
    /// Gate record identifier, assigned by the gate store.
    pub id: GateId,
    /// The case this gate evaluates.
    pub case_id: CaseId,
    /// Current status.
    pub status: GateStatus,
    /// Whether the case is currently blocked from downstream processing.
    pub blocked: bool,
    /// Assigned risk level.
    pub risk_level: RiskLevel,
    /// Human reviewer id, if a human has acted on this gate.
    pub reviewer_id: Option<String>,
    /// Reviewer's free-text reason, if any.
    pub review_reason: Option<String>,
    /// When the gate record was created.
    pub created_at: Timestamp,
    /// When the gate was last reviewed (by a human or the validator).
    pub reviewed_at: Option<Timestamp>,
    /// The classification + validator decision payload backing this status.
    pub decision_payload: serde_json::Value,
}

// ============================================================================
// SECTION: Clarification Session
// ============================================================================

/// A single question posed to a user during clarification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSpec {
    /// Question identifier, unique within the owning session.
    pub id: QuestionId,
    /// The prompt text shown to the user.
    pub prompt: String,
    /// Whether an answer is required before the session can resolve.
    pub required: bool,
}

/// Status of a [`ClarificationSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Awaiting responses.
    Active,
    /// All required questions answered; awaiting re-validation.
    Responded,
    /// Re-validated and approved.
    Resolved,
    /// Expired before all required questions were answered.
    Expired,
    /// Cancelled by an operator.
    Cancelled,
    /// Downstream processing resumed after resolution.
    Resumed,
}

/// An error produced while mutating a [`ClarificationSession`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A response was recorded against a question id the session never
    /// asked.
    #[error("question {0} is not part of this clarification session")]
    UnknownQuestion(QuestionId),
}

/// Clarification session state.
///
/// # Invariants
/// - `responses` keys are always a subset of `questions[*].id`; enforced by
///   [`Self::record_response`], the only mutator of `responses`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationSession {
    /// Session identifier, assigned by the session store.
    pub id: SessionId,
    /// The case this session clarifies.
    pub case_id: CaseId,
    /// Human-facing case number, for display in Slack.
    pub case_number: String,
    /// Questions posed to the user.
    pub questions: Vec<QuestionSpec>,
    /// Answers received so far.
    pub responses: BTreeMap<QuestionId, String>,
    /// Deadline after which the session expires if unresolved.
    pub expires_at: Timestamp,
    /// Current status.
    pub status: SessionStatus,
    /// Slack channel id the questions were posted to.
    pub slack_channel: Option<String>,
    /// Slack thread timestamp the questions were posted to.
    pub slack_thread_ts: Option<String>,
    /// The quality gate this session was opened to resolve.
    pub linked_gate_id: GateId,
    /// Number of reminders already sent.
    pub reminders_sent: u32,
}

impl ClarificationSession {
    /// Records a user's answer to `question_id`.
    ///
    /// # Errors
    /// Returns [`SessionError::UnknownQuestion`] if `question_id` is not one
    /// of `questions[*].id`.
    pub fn record_response(
        &mut self,
        question_id: QuestionId,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        if !self.questions.iter().any(|q| q.id == question_id) {
            return Err(SessionError::UnknownQuestion(question_id));
        }
        self.responses.insert(question_id, value.into());
        Ok(())
    }

    /// Returns `true` if every required question has a recorded response.
    #[must_use]
    pub fn all_required_answered(&self) -> bool {
        self.questions
            .iter()
            .filter(|q| q.required)
            .all(|q| self.responses.contains_key(&q.id))
    }

    /// Returns the required questions that still lack a response.
    #[must_use]
    pub fn unanswered_required(&self) -> Vec<&QuestionSpec> {
        self.questions
            .iter()
            .filter(|q| q.required && !self.responses.contains_key(&q.id))
            .collect()
    }
}

// ============================================================================
// SECTION: Escalation
// ============================================================================

/// A reason an escalation was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationTrigger {
    /// Any business-intelligence flag fired.
    BusinessIntelligenceFlag,
    /// The composite BI score met or exceeded the configured threshold.
    CompositeScoreThreshold,
    /// The category is configured as non-business-as-usual.
    NonBau,
    /// The narrative stage explicitly recommended escalation.
    NarrativeEscalateTone,
}

/// Status of an [`Escalation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationStatus {
    /// Created, not yet posted to Slack.
    Pending,
    /// Posted to Slack, awaiting acknowledgement.
    Posted,
    /// Acknowledged by an on-call responder.
    Acknowledged,
    /// Cancelled as a duplicate or no longer applicable.
    Cancelled,
}

impl EscalationStatus {
    /// Returns `true` for statuses the dedup window treats as "active".
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Posted)
    }
}

/// Coordinates of the Slack message an escalation was posted as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackMessageRef {
    /// Slack channel id the message was posted to.
    pub channel: String,
    /// Slack message timestamp, used as the message's stable id.
    pub ts: String,
}

/// An escalation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    /// Escalation identifier, assigned by the escalation store.
    pub id: EscalationId,
    /// Human-facing case number escalated.
    pub case_number: String,
    /// Triggers that fired for this escalation.
    pub triggers: Vec<EscalationTrigger>,
    /// Composite business-intelligence score at the time of triggering.
    pub bi_score: f32,
    /// Name of the channel-selection rule that matched.
    pub routing_rule_name: String,
    /// Chosen Slack channel id.
    pub channel: String,
    /// Slack message coordinates, once posted.
    pub slack_message: Option<SlackMessageRef>,
    /// Current status.
    pub status: EscalationStatus,
    /// When the escalation was created.
    pub created_at: Timestamp,
    /// When the escalation was acknowledged, if it has been.
    pub acknowledged_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Muscle-Memory Exemplar
// ============================================================================

/// Signals contributing to a [`MuscleMemoryExemplar`]'s quality score.
///
/// # Invariants
/// - Each signal weight sums to `1.0` across the four buckets:
///   supervisor approval 0.4, outcome success 0.2, human feedback 0.2,
///   cold-start neutral 0.2.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualitySignals {
    /// A supervisor explicitly approved the action taken.
    pub supervisor_approved: Option<bool>,
    /// The recorded outcome was a success.
    pub outcome_success: Option<bool>,
    /// A human provided direct feedback on the action.
    pub human_feedback_positive: Option<bool>,
}

impl QualitySignals {
    /// Weight given to supervisor approval.
    pub const SUPERVISOR_WEIGHT: f32 = 0.4;
    /// Weight given to outcome success.
    pub const OUTCOME_WEIGHT: f32 = 0.2;
    /// Weight given to human feedback.
    pub const FEEDBACK_WEIGHT: f32 = 0.2;
    /// Weight given to the cold-start neutral baseline, when no other
    /// signal is available.
    pub const COLD_START_WEIGHT: f32 = 0.2;

    /// Computes the weighted quality score in `[0, 1]` for this signal
    /// bundle. Missing signals contribute their weight at a neutral `0.5`.
    #[must_use]
    pub fn weighted_score(&self) -> f32 {
        let component = |signal: Option<bool>, weight: f32| {
            weight * signal.map_or(0.5, |value| if value { 1.0 } else { 0.0 })
        };
        let score = component(self.supervisor_approved, Self::SUPERVISOR_WEIGHT)
            + component(self.outcome_success, Self::OUTCOME_WEIGHT)
            + component(self.human_feedback_positive, Self::FEEDBACK_WEIGHT)
            + Self::COLD_START_WEIGHT * 0.5;
        score.clamp(0.0, 1.0)
    }
}

/// A recorded past interaction biasing future classification.
///
/// # Invariants
/// - `embedding` always has exactly [`EMBEDDING_DIMENSIONS`] elements.
/// - `quality_score` is finite and within `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuscleMemoryExemplar {
    /// Exemplar identifier, assigned by the exemplar store.
    pub id: ExemplarId,
    /// Case number this exemplar was derived from.
    pub case_number: String,
    /// The kind of interaction recorded (e.g. `"classification"`,
    /// `"escalation_response"`).
    pub interaction_type: String,
    /// Snapshot of the input context at the time of the action.
    pub input_context_snapshot: serde_json::Value,
    /// The action taken.
    pub action_taken: String,
    /// The recorded outcome.
    pub outcome: String,
    /// 1536-dimensional embedding vector.
    pub embedding: Vec<f32>,
    /// Current quality score in `[0, 1]`.
    pub quality_score: f32,
    /// Signals the quality score was derived from.
    pub quality_signals: QualitySignals,
    /// When the exemplar was first recorded.
    pub created_at: Timestamp,
    /// When the exemplar was last updated.
    pub updated_at: Timestamp,
}

impl MuscleMemoryExemplar {
    /// Returns `true` if `embedding` has exactly [`EMBEDDING_DIMENSIONS`]
    /// elements.
    #[must_use]
    pub fn has_valid_embedding_length(&self) -> bool {
        self.embedding.len() == EMBEDDING_DIMENSIONS
    }
}

// ============================================================================
// SECTION: Audit Entry
// ============================================================================

/// An append-only record of a single state transition observed anywhere in
/// the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Identifier assigned by the audit sink.
    pub id: super::identifiers::AuditEntryId,
    /// Kind of entity this entry describes (e.g. `"gate"`, `"session"`,
    /// `"escalation"`).
    pub entity_type: String,
    /// Identifier of the entity, as a string (entities use different id
    /// types; the audit trail is entity-agnostic).
    pub entity_id: String,
    /// The action performed (e.g. `"approved"`, `"escalated"`).
    pub action: String,
    /// Snapshot of the entity's state before the action, if applicable.
    pub prior_state: Option<serde_json::Value>,
    /// Snapshot of the entity's state after the action.
    pub new_state: serde_json::Value,
    /// Free-text reason for the transition.
    pub reason: Option<String>,
    /// The actor that performed the action (a user id, or a system
    /// component name such as `"validator"`).
    pub actor: String,
    /// When the action was performed.
    pub performed_at: Timestamp,
    /// Arbitrary structured metadata.
    pub metadata: serde_json::Value,
    /// Process-monotonic sequence number, used only to break ties between
    /// entries with identical `performed_at` values.
    pub sequence: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, required: bool) -> QuestionSpec {
        QuestionSpec {
            id: QuestionId::new(id),
            prompt: format!("prompt for {id}"),
            required,
        }
    }

    #[test]
    fn clarification_session_rejects_unknown_question() {
        let mut session = ClarificationSession {
            id: SessionId::from_raw(1).expect("nonzero"),
            case_id: CaseId::new("c-1"),
            case_number: "CS0000001".to_string(),
            questions: vec![question("q1", true)],
            responses: BTreeMap::new(),
            expires_at: Timestamp::now(),
            status: SessionStatus::Active,
            slack_channel: None,
            slack_thread_ts: None,
            linked_gate_id: GateId::from_raw(1).expect("nonzero"),
            reminders_sent: 0,
        };

        assert!(
            session
                .record_response(QuestionId::new("unknown"), "value")
                .is_err()
        );
        assert!(session.record_response(QuestionId::new("q1"), "value").is_ok());
        assert!(session.all_required_answered());
    }

    #[test]
    fn clarification_session_tracks_unanswered_required_questions() {
        let session = ClarificationSession {
            id: SessionId::from_raw(1).expect("nonzero"),
            case_id: CaseId::new("c-1"),
            case_number: "CS0000001".to_string(),
            questions: vec![question("q1", true), question("q2", false)],
            responses: BTreeMap::new(),
            expires_at: Timestamp::now(),
            status: SessionStatus::Active,
            slack_channel: None,
            slack_thread_ts: None,
            linked_gate_id: GateId::from_raw(1).expect("nonzero"),
            reminders_sent: 0,
        };

        assert!(!session.all_required_answered());
        assert_eq!(session.unanswered_required().len(), 1);
    }

    #[test]
    fn business_intelligence_counts_flagged() {
        let mut bi = BusinessIntelligence::default();
        assert_eq!(bi.flagged_count(), 0);
        bi.compliance_impact = BiFlag::set("regulated data involved");
        bi.executive_visibility = BiFlag::set("CFO opened the case");
        assert_eq!(bi.flagged_count(), 2);
    }

    #[test]
    fn quality_signals_weighted_score_is_bounded() {
        let signals = QualitySignals {
            supervisor_approved: Some(true),
            outcome_success: Some(true),
            human_feedback_positive: Some(true),
        };
        let score = signals.weighted_score();
        assert!((0.0..=1.0).contains(&score));
        assert!(score > 0.9);
    }

    #[test]
    fn narrative_step_count_validates_range() {
        let mut narrative = Narrative {
            quick_summary: "summary".to_string(),
            immediate_next_steps: vec![],
            tone: NarrativeTone::Confident,
        };
        assert!(!narrative.has_valid_step_count());
        narrative.immediate_next_steps = vec!["step one".to_string()];
        assert!(narrative.has_valid_step_count());
    }
}
