// crates/caseflow-server/src/worker.rs
// ============================================================================
// Module: Background Job Worker
// Description: Dispatches every background job the task queue publishes —
//              case classification, clarification-session expiry, the
//              stuck-case sweep, and the digest crons — by wiring
//              `caseflow-pipeline`, `caseflow-validator`,
//              `caseflow-clarification`, `caseflow-escalation`, and
//              `caseflow-monitor` against `AppState`.
// Purpose: Keep the orchestration sequence (load context, classify,
//          validate, gate, clarify/escalate/record) in one place, called the
//          same way whether a job runs inline or off a signed worker
//          endpoint.
// Dependencies: caseflow-clarification, caseflow-config, caseflow-core,
//               caseflow-escalation, caseflow-monitor, caseflow-pipeline,
//               caseflow-validator, serde, serde_json
// ============================================================================

//! ## Overview
//! [`process_job`] is the single entry point both the inline task-queue path
//! and the signed worker endpoint call. Case classification
//! ([`classify_case`]) is the only job with a non-trivial pipeline; the four
//! cron jobs are each a thin call into the crate that owns the behavior
//! (`caseflow-clarification`, `caseflow-monitor`) or a small store query this
//! module composes into a Slack digest. Every mutation that is not the
//! primary result of a job (an audit entry, a Slack notification) is
//! best-effort: its failure is logged, never propagated, per the same rule
//! `caseflow-escalation` and `caseflow-monitor` already apply to their own
//! audit writes.

use std::num::NonZeroU64;

use caseflow_core::AuditEntry;
use caseflow_core::AuditEntryId;
use caseflow_core::AuditSink;
use caseflow_core::Case;
use caseflow_core::CaseId;
use caseflow_core::CaseRepository;
use caseflow_core::ClarificationSession;
use caseflow_core::CoreError;
use caseflow_core::EmbeddingClient;
use caseflow_core::GateId;
use caseflow_core::GateStatus;
use caseflow_core::GateStore;
use caseflow_core::MuscleMemoryExemplar;
use caseflow_core::QualityGateRecord;
use caseflow_core::QualitySignals;
use caseflow_core::QuestionId;
use caseflow_core::QuestionSpec;
use caseflow_core::RiskLevel;
use caseflow_core::SessionId;
use caseflow_core::SessionStore;
use caseflow_core::SlackClient;
use caseflow_core::Timestamp;
use caseflow_escalation::EscalationRouter;
use caseflow_escalation::EscalationRouterError;
use caseflow_escalation::slack_payload;
use caseflow_pipeline::ClassificationPipeline;
use caseflow_pipeline::ContextLoader;
use caseflow_pipeline::MuscleMemoryRetriever;
use caseflow_pipeline::PipelineError;
use caseflow_validator::ValidationOutcome;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;

use crate::state::AppState;

/// Placeholder id handed to a freshly built record before the owning store's
/// `create` call assigns the real one.
const PLACEHOLDER_GATE_ID: GateId = GateId::new(NonZeroU64::MIN);
/// Placeholder id for a freshly opened clarification session.
const PLACEHOLDER_SESSION_ID: SessionId = SessionId::new(NonZeroU64::MIN);
/// Placeholder id passed into [`AuditSink::append`]; concrete sinks assign
/// the real id and sequence number on write.
const PLACEHOLDER_AUDIT_ID: AuditEntryId = AuditEntryId::new(NonZeroU64::MIN);

/// A unit of background work, published onto the task queue and consumed
/// either inline or off the signed worker endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    /// Loads context for `case_id`, runs the classification pipeline, and
    /// acts on the resulting quality-gate decision.
    ClassifyCase {
        /// The case to classify.
        case_id: CaseId,
        /// The caller whose identity selects the case-repository rollout.
        caller_id: String,
        /// The Slack channel the triggering request arrived on, if any.
        channel_id: Option<String>,
    },
    /// Records one Slack-interactivity answer against an active
    /// clarification session, resolving it once every required question has
    /// been answered.
    RecordClarificationResponse {
        /// The session the answer belongs to.
        session_id: SessionId,
        /// The question being answered.
        question_id: QuestionId,
        /// The answer text.
        value: String,
    },
    /// Expires overdue clarification sessions and sends due reminders.
    ExpireClarificationSessions,
    /// Runs the stuck-case severity sweep.
    MonitorStuckCases,
    /// Posts a digest of currently blocked gates by risk level.
    CaseLeaderboard,
    /// Posts the rolling 24-hour approval/block rate.
    CaseQueueReport,
    /// Posts current queue depth by severity bucket.
    CaseQueueSnapshot,
}

/// Runs `job` to completion against `state`.
///
/// # Errors
/// Returns [`CoreError`] if a non-best-effort step fails: the context
/// loader's case fetch, the classification pipeline's backend call, a
/// primary store write, or a cron job's own store query.
pub fn process_job(state: &AppState, job: &Job) -> Result<(), CoreError> {
    match job {
        Job::ClassifyCase {
            case_id,
            caller_id,
            channel_id,
        } => classify_case(state, case_id, caller_id, channel_id.clone()),
        Job::RecordClarificationResponse {
            session_id,
            question_id,
            value,
        } => record_clarification_response(state, *session_id, question_id.clone(), value.clone()),
        Job::ExpireClarificationSessions => expire_clarification_sessions(state),
        Job::MonitorStuckCases => monitor_stuck_cases(state),
        Job::CaseLeaderboard => case_leaderboard(state),
        Job::CaseQueueReport => case_queue_report(state),
        Job::CaseQueueSnapshot => case_queue_snapshot(state),
    }
}

// ============================================================================
// SECTION: Case Classification
// ============================================================================

/// Loads context for `case_id`, runs the classification pipeline, and routes
/// the result to the parse-failure or success path.
fn classify_case(
    state: &AppState,
    case_id: &CaseId,
    caller_id: &str,
    channel_id: Option<String>,
) -> Result<(), CoreError> {
    let posting_channel = channel_id.clone();
    let case_repo = state.case_repository_for(caller_id, channel_id);
    let loader = ContextLoader::new(
        &case_repo,
        state.servicenow.as_ref(),
        state.servicenow.as_ref(),
        state.servicenow.as_ref(),
        &state.embedding,
        state.store.as_ref(),
        &state.config.muscle_memory,
    );
    let pack = loader.load(case_id)?;
    let case = pack.case.clone();

    let pipeline = ClassificationPipeline::new(&state.llm, &state.config.pipeline);
    match pipeline.run(&pack) {
        Ok(classification) => finish_classified_case(state, &case_repo, &case, classification, posting_channel.as_deref()),
        Err(PipelineError::StageParseError { stage }) => finish_unparseable_case(state, &case_repo, &case, stage),
        Err(PipelineError::Core(err)) => Err(err),
    }
}

/// Records a blocked gate for a case whose classification could not be
/// parsed after retry, and leaves a work note explaining why.
fn finish_unparseable_case(
    state: &AppState,
    case_repo: &dyn CaseRepository,
    case: &Case,
    stage: &'static str,
) -> Result<(), CoreError> {
    let outcome = caseflow_validator::parse_failure_outcome();
    let decision_payload = json!({ "failed_stage": stage });
    persist_new_gate(state, case, &outcome, decision_payload)?;

    let note = format!(
        "Automated classification failed at the {stage} stage after retry; case held for manual review."
    );
    case_repo.append_work_note(&case.id, &note)?;
    Ok(())
}

/// Validates a successful classification against the rule engine, persists
/// the resulting gate, and acts on its status (clarify, approve, block),
/// then routes the case for escalation if the outcome calls for it.
fn finish_classified_case(
    state: &AppState,
    case_repo: &dyn CaseRepository,
    case: &Case,
    classification: caseflow_core::CaseClassification,
    posting_channel: Option<&str>,
) -> Result<(), CoreError> {
    let outcome = caseflow_validator::evaluate(case, &classification, &state.config.validator);
    let decision_payload = json!({
        "classification": &classification,
        "checks": &outcome.checks,
        "recommendations": &outcome.recommendations,
    });
    let gate = persist_new_gate(state, case, &outcome, decision_payload)?;

    case_repo.apply_classification(&case.id, &classification.category, classification.subcategory.as_deref())?;

    match outcome.status {
        GateStatus::ClarificationNeeded => {
            open_clarification(state, case, &gate, &outcome.questions)?;
        }
        GateStatus::Approved => {
            let overview = crate::overview::render(case, &classification);
            case_repo.append_work_note(&case.id, &overview)?;
            post_approval_overview(state, case, &classification, posting_channel);
            record_exemplar(state, case, &classification);
        }
        GateStatus::Blocked => {
            case_repo.append_work_note(&case.id, "Classification blocked by quality gate; held for manual review.")?;
        }
        other => {
            return Err(CoreError::InvalidResponse {
                source: "caseflow_validator",
                detail: format!("evaluate produced unexpected gate status {other:?}"),
            });
        }
    }

    route_escalation(state, case, &classification, outcome.forced_escalation)?;
    Ok(())
}

/// Best-effort posts the approved-case overview to the triggering Slack
/// channel, if the classification was requested from one.
fn post_approval_overview(
    state: &AppState,
    case: &Case,
    classification: &caseflow_core::CaseClassification,
    posting_channel: Option<&str>,
) {
    let Some(channel) = posting_channel else {
        return;
    };
    let blocks = crate::overview::build_blocks(case, classification);
    if state.slack.post_message(channel, None, blocks).is_err() {
        tracing::warn!(case_number = %case.number, "failed to post approval overview to slack");
    }
}

/// Persists a freshly decided gate record, applying the state-machine event
/// that matches `outcome.status` and writing a best-effort audit entry.
fn persist_new_gate(
    state: &AppState,
    case: &Case,
    outcome: &ValidationOutcome,
    decision_payload: serde_json::Value,
) -> Result<QualityGateRecord, CoreError> {
    let event = match outcome.status {
        GateStatus::Approved => caseflow_validator::GateEvent::InitialApprove,
        GateStatus::ClarificationNeeded => caseflow_validator::GateEvent::InitialClarificationNeeded,
        GateStatus::Blocked => caseflow_validator::GateEvent::InitialBlock,
        other => {
            return Err(CoreError::InvalidResponse {
                source: "caseflow_validator",
                detail: format!("evaluate produced unexpected gate status {other:?}"),
            });
        }
    };
    let status = caseflow_validator::transition(GateStatus::New, event).map_err(|err| CoreError::InvalidResponse {
        source: "caseflow_validator",
        detail: err.to_string(),
    })?;

    let record = QualityGateRecord {
        id: PLACEHOLDER_GATE_ID,
        case_id: case.id.clone(),
        status,
        blocked: status == GateStatus::Blocked,
        risk_level: outcome.risk_level,
        reviewer_id: None,
        review_reason: None,
        created_at: Timestamp::now(),
        reviewed_at: None,
        decision_payload,
    };
    let created = state.store.create(record)?;
    best_effort_audit(
        state,
        "gate",
        created.id.to_string(),
        "evaluated",
        None,
        serde_json::to_value(&created).unwrap_or(serde_json::Value::Null),
    );
    Ok(created)
}

/// Opens a clarification session for a gate that needs one, with an expiry
/// set far enough out to cover every configured reminder.
fn open_clarification(
    state: &AppState,
    case: &Case,
    gate: &QualityGateRecord,
    questions: &[QuestionSpec],
) -> Result<(), CoreError> {
    if questions.is_empty() {
        return Ok(());
    }
    let policy = state.config.clarification.policy_for(&case.company);
    let lead = time::Duration::minutes(i64::from(policy.reminder_lead_minutes) * i64::from(policy.max_reminders));
    let expires_at = Timestamp::now()
        .checked_add(lead)
        .unwrap_or_else(Timestamp::now);

    let session = caseflow_clarification::open(
        PLACEHOLDER_SESSION_ID,
        case.id.clone(),
        case.number.clone(),
        questions.to_vec(),
        gate.id,
        expires_at,
        None,
        None,
    );
    let created = state.store.create(session)?;
    best_effort_audit(
        state,
        "session",
        created.id.to_string(),
        "opened",
        None,
        serde_json::to_value(&created).unwrap_or(serde_json::Value::Null),
    );
    Ok(())
}

/// Builds the escalation reason from the classification's own signals and
/// routes the case through [`EscalationRouter`].
fn route_escalation(
    state: &AppState,
    case: &Case,
    classification: &caseflow_core::CaseClassification,
    forced: bool,
) -> Result<(), CoreError> {
    let reason = if forced {
        "category is configured as non-business-as-usual".to_string()
    } else if classification.narrative.tone == caseflow_core::NarrativeTone::Escalate {
        "narrative stage recommended escalation".to_string()
    } else {
        "composite business-intelligence score met the escalation threshold".to_string()
    };

    let router = EscalationRouter::new(
        state.store.as_ref(),
        &state.slack,
        state.store.as_ref(),
        &state.config.escalation,
    );
    match router.route(case, classification, forced, &reason) {
        Ok(_) => Ok(()),
        Err(EscalationRouterError::Core(err)) => Err(err),
        Err(EscalationRouterError::NoMatchingRule(err)) => Err(CoreError::InvalidResponse {
            source: "escalation_routing",
            detail: err.to_string(),
        }),
    }
}

/// Records a newly approved classification as a muscle-memory exemplar,
/// re-deriving the same embedding text `caseflow_pipeline::muscle_memory`
/// builds internally (that helper is private to its crate).
fn record_exemplar(state: &AppState, case: &Case, classification: &caseflow_core::CaseClassification) {
    let text = case.long_description.as_deref().map_or_else(
        || case.short_description.clone(),
        |long| format!("{}\n\n{}", case.short_description, long),
    );
    let Ok(embedding) = state.embedding.embed(&text) else {
        return;
    };

    let candidate = MuscleMemoryExemplar {
        id: caseflow_core::ExemplarId::new(NonZeroU64::MIN),
        case_number: case.number.clone(),
        interaction_type: "classification".to_string(),
        input_context_snapshot: serde_json::to_value(classification).unwrap_or(serde_json::Value::Null),
        action_taken: classification.narrative.immediate_next_steps.join("; "),
        outcome: "approved".to_string(),
        embedding,
        quality_score: 0.0,
        quality_signals: QualitySignals::default(),
        created_at: Timestamp::now(),
        updated_at: Timestamp::now(),
    };

    let retriever = MuscleMemoryRetriever::new(&state.embedding, state.store.as_ref(), &state.config.muscle_memory);
    let _ = retriever.record(candidate);
}

// ============================================================================
// SECTION: Clarification Response Handling
// ============================================================================

/// Records one answer against `session_id` and, once every required question
/// has been answered, resolves the session and approves its linked gate.
///
/// A session resolved this way is always approved rather than re-blocked:
/// the questions a [`caseflow_validator`] clarification check raises exist
/// precisely so a human can supply the missing fact: see Open Question
/// decisions in `DESIGN.md`.
fn record_clarification_response(
    state: &AppState,
    session_id: SessionId,
    question_id: QuestionId,
    value: String,
) -> Result<(), CoreError> {
    let mut session = state.store.get(session_id)?;
    caseflow_clarification::record_response(&mut session, question_id, value).map_err(|err| {
        CoreError::InvalidResponse {
            source: "caseflow_clarification",
            detail: err.to_string(),
        }
    })?;
    state.store.update(session.clone())?;
    best_effort_audit(
        state,
        "session",
        session.id.to_string(),
        "responded",
        None,
        serde_json::to_value(&session).unwrap_or(serde_json::Value::Null),
    );

    if session.status == caseflow_core::SessionStatus::Responded {
        resolve_clarification_session(state, session)?;
    }
    Ok(())
}

/// Moves a fully answered session `RESPONDED -> RESOLVED -> RESUMED`,
/// approves its linked gate, and leaves a work note summarizing the
/// recorded answers.
fn resolve_clarification_session(state: &AppState, mut session: ClarificationSession) -> Result<(), CoreError> {
    let linked_gate_id = session.linked_gate_id;
    if caseflow_clarification::resolve(&mut session).is_err() {
        return Ok(());
    }

    let mut gate = state.store.get(linked_gate_id)?;
    let status = caseflow_validator::transition(gate.status, caseflow_validator::GateEvent::ClarificationApprove)
        .map_err(|err| CoreError::InvalidResponse {
            source: "caseflow_validator",
            detail: err.to_string(),
        })?;
    gate.status = status;
    gate.blocked = false;
    gate.reviewed_at = Some(Timestamp::now());
    state.store.update(gate.clone())?;
    best_effort_audit(
        state,
        "gate",
        gate.id.to_string(),
        "clarification_approved",
        None,
        serde_json::to_value(&gate).unwrap_or(serde_json::Value::Null),
    );

    if caseflow_clarification::resume(&mut session).is_ok() {
        state.store.update(session.clone())?;
    }

    if let Ok(case) = state.servicenow.get_case(&session.case_id) {
        let answers: Vec<String> = session
            .responses
            .iter()
            .map(|(question, answer)| format!("{question}: {answer}"))
            .collect();
        let note = format!(
            "Clarification resolved for case {}; recorded answers: {}",
            session.case_number,
            answers.join("; ")
        );
        let _ = state.servicenow.append_work_note(&case.id, &note);
    }
    Ok(())
}

// ============================================================================
// SECTION: Clarification Sweep
// ============================================================================

/// Walks every active clarification session, expiring overdue ones and
/// sending a reminder to the rest when one is due.
fn expire_clarification_sessions(state: &AppState) -> Result<(), CoreError> {
    let now = Timestamp::now();
    for session in state.store.find_active()? {
        if caseflow_clarification::is_overdue(&session, now) {
            expire_one_session(state, session, now)?;
        } else {
            maybe_send_reminder(state, session, now);
        }
    }
    Ok(())
}

/// Expires one overdue session and transitions its linked gate, both as
/// best-effort follow-ups to the expiry itself.
fn expire_one_session(state: &AppState, mut session: ClarificationSession, now: Timestamp) -> Result<(), CoreError> {
    let linked_gate_id = session.linked_gate_id;
    if caseflow_clarification::expire(&mut session).is_err() {
        return Ok(());
    }
    state.store.update(session.clone())?;
    best_effort_audit(
        state,
        "session",
        session.id.to_string(),
        "expired",
        None,
        serde_json::to_value(&session).unwrap_or(serde_json::Value::Null),
    );

    let mut gate = state.store.get(linked_gate_id)?;
    let Ok(status) = caseflow_validator::transition(gate.status, caseflow_validator::GateEvent::ClarificationExpire)
    else {
        return Ok(());
    };
    gate.status = status;
    gate.blocked = false;
    gate.reviewed_at = Some(now);
    state.store.update(gate.clone())?;
    best_effort_audit(
        state,
        "gate",
        gate.id.to_string(),
        "expired",
        None,
        serde_json::to_value(&gate).unwrap_or(serde_json::Value::Null),
    );
    Ok(())
}

/// Sends a reminder for `session` if its policy says one is due, re-fetching
/// the case to resolve the per-company reminder policy.
fn maybe_send_reminder(state: &AppState, mut session: ClarificationSession, now: Timestamp) {
    let Ok(case) = state.servicenow.get_case(&session.case_id) else {
        return;
    };
    let policy = state.config.clarification.policy_for(&case.company);
    let policy = caseflow_clarification::ReminderPolicy {
        reminder_lead_minutes: policy.reminder_lead_minutes,
        max_reminders: policy.max_reminders,
    };
    if !caseflow_clarification::reminder_due(&session, now, policy) {
        return;
    }

    let lines: Vec<String> = session
        .unanswered_required()
        .iter()
        .map(|question| format!("• {}", question.prompt))
        .collect();
    let title = format!("Clarification reminder: {}", session.case_number);
    let blocks = slack_payload::build_summary_blocks(&title, &lines);
    let channel = session.slack_channel.clone().unwrap_or_else(|| state.config.escalation.default_channel_id.clone());
    if state.slack.post_message(&channel, session.slack_thread_ts.as_deref(), blocks).is_err() {
        return;
    }

    caseflow_clarification::record_reminder_sent(&mut session);
    let _ = state.store.update(session);
}

// ============================================================================
// SECTION: Stuck-Case Monitor and Digest Crons
// ============================================================================

/// Runs the stuck-case severity sweep and logs its summary counts.
fn monitor_stuck_cases(state: &AppState) -> Result<(), CoreError> {
    let monitor = caseflow_monitor::StuckCaseMonitor::new(
        state.store.as_ref(),
        &state.slack,
        state.store.as_ref(),
        &state.config.monitor,
        &state.config.escalation.default_channel_id,
    );
    let report = monitor.sweep()?;
    tracing::info!(
        alert_posts = report.alert_posts_sent,
        critical_summary_sent = report.critical_summary_sent,
        warning_summary_sent = report.warning_summary_sent,
        "stuck-case sweep complete"
    );
    Ok(())
}

/// Posts current blocked-gate queue depth by severity bucket.
fn case_queue_snapshot(state: &AppState) -> Result<(), CoreError> {
    let buckets = caseflow_monitor::bucket::bucket_blocked_gates(state.store.as_ref(), &state.config.monitor)?;
    let lines = vec![
        format!("• Warning: {}", buckets.warning.len()),
        format!("• Critical: {}", buckets.critical.len()),
        format!("• Alert: {}", buckets.alert.len()),
    ];
    post_digest(state, "Case queue snapshot", &lines)
}

/// Posts the rolling 24-hour approval/block rate.
fn case_queue_report(state: &AppState) -> Result<(), CoreError> {
    let metrics = caseflow_monitor::GateMetrics::from_counts(state.store.rolling_24h_counts()?);
    let lines = vec![
        format!("• Approved (24h): {}", metrics.approved_count),
        format!("• Blocked (24h): {}", metrics.blocked_count),
        format!("• Total (24h): {}", metrics.total_count),
        format!("• Approval rate: {:.1}%", metrics.approval_rate() * 100.0),
    ];
    post_digest(state, "Case queue report", &lines)
}

/// Posts a digest of currently blocked gates grouped by risk level.
fn case_leaderboard(state: &AppState) -> Result<(), CoreError> {
    let blocked = state.store.find_blocked_older_than(0)?;
    let count_at = |risk: RiskLevel| blocked.iter().filter(|gate| gate.risk_level == risk).count();
    let lines = vec![
        format!("• High risk: {}", count_at(RiskLevel::High)),
        format!("• Medium risk: {}", count_at(RiskLevel::Medium)),
        format!("• Low risk: {}", count_at(RiskLevel::Low)),
    ];
    post_digest(state, "Blocked-case leaderboard", &lines)
}

/// Posts a titled bullet-list digest to the default escalation channel and
/// records a best-effort audit entry.
fn post_digest(state: &AppState, title: &str, lines: &[String]) -> Result<(), CoreError> {
    let blocks = slack_payload::build_summary_blocks(title, lines);
    state
        .slack
        .post_message(&state.config.escalation.default_channel_id, None, blocks)?;
    best_effort_audit(
        state,
        "digest",
        title.to_string(),
        "posted",
        None,
        json!({ "lines": lines }),
    );
    Ok(())
}

/// Writes an audit entry, discarding any failure: audit writes are
/// best-effort and never fail the primary operation they describe.
fn best_effort_audit(
    state: &AppState,
    entity_type: &str,
    entity_id: String,
    action: &str,
    prior_state: Option<serde_json::Value>,
    new_state: serde_json::Value,
) {
    let _ = state.store.append(AuditEntry {
        id: PLACEHOLDER_AUDIT_ID,
        entity_type: entity_type.to_string(),
        entity_id,
        action: action.to_string(),
        prior_state,
        new_state,
        reason: None,
        actor: "worker".to_string(),
        performed_at: Timestamp::now(),
        metadata: serde_json::Value::Null,
        sequence: 0,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_serializes_with_a_tagged_kind() {
        let job = Job::ClassifyCase {
            case_id: CaseId::new("c-1"),
            caller_id: "slack:U1".to_string(),
            channel_id: Some("C1".to_string()),
        };
        let value = serde_json::to_value(&job).expect("serializes");
        assert_eq!(value["kind"], "classify_case");
        assert_eq!(value["case_id"], "c-1");
    }

    #[test]
    fn cron_jobs_round_trip_through_json() {
        for job in [
            Job::ExpireClarificationSessions,
            Job::MonitorStuckCases,
            Job::CaseLeaderboard,
            Job::CaseQueueReport,
            Job::CaseQueueSnapshot,
        ] {
            let value = serde_json::to_value(&job).expect("serializes");
            let round_tripped: Job = serde_json::from_value(value).expect("deserializes");
            assert_eq!(format!("{round_tripped:?}"), format!("{job:?}"));
        }
    }
}
