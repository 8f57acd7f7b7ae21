// crates/caseflow-validator/src/lib.rs
// ============================================================================
// Module: Caseflow Validator
// Description: Deterministic quality-gate rule engine and the gate status
//              state machine.
// Purpose: Turn a classification result into one of APPROVED,
//          CLARIFICATION_NEEDED, or BLOCKED, with the checks, questions, and
//          recommendations that justify it.
// Dependencies: caseflow-core, caseflow-rules, serde, thiserror
// ============================================================================

//! ## Overview
//! [`evaluate`] runs the five ordered checks this crate implements (BI
//! consistency, record-type consistency, category consistency, confidence
//! threshold, then recommendations) against a [`CaseClassification`] and
//! returns a [`ValidationOutcome`]. The checks themselves are built from
//! `caseflow-rules`' tri-state vocabulary so "the case has no opinion" and
//! "the case actively says no" never collapse into the same branch.
//!
//! [`transition`] enforces the gate status state machine separately from
//! evaluation: `NEW -> {APPROVED, CLARIFICATION_NEEDED, BLOCKED}`, and from
//! `CLARIFICATION_NEEDED -> {APPROVED, BLOCKED, EXPIRED}`. `APPROVED`,
//! `REJECTED`, and `EXPIRED` are terminal.

mod checks;
mod state_machine;

use caseflow_core::{Case, CaseClassification, GateStatus, QuestionId, QuestionSpec, RiskLevel};
use caseflow_rules::Check;

pub use state_machine::{GateEvent, TransitionError, transition};

/// The full result of running [`evaluate`] against one classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    /// The terminal-for-this-pass gate status: `APPROVED`,
    /// `CLARIFICATION_NEEDED`, or `BLOCKED`. Never any other variant.
    pub status: GateStatus,
    /// Every check that ran, in evaluation order, for the audit trail.
    pub checks: Vec<Check>,
    /// Clarification questions to open a session with, populated only when
    /// `status` is `CLARIFICATION_NEEDED`.
    pub questions: Vec<QuestionSpec>,
    /// Whether this classification should be routed through the escalation
    /// router regardless of the gate outcome (e.g. a non-BAU category).
    pub forced_escalation: bool,
    /// Whether a human reviewer should be looped in even if the gate
    /// approves (e.g. executive visibility).
    pub requires_human_review: bool,
    /// Free-text recommendations derived from the checks that matched,
    /// surfaced in the work note and Slack thread.
    pub recommendations: Vec<String>,
    /// Risk level assigned from the BI flags and category configuration.
    pub risk_level: RiskLevel,
}

impl ValidationOutcome {
    /// Returns `true` if any check produced [`caseflow_rules::CheckOutcome::Fail`].
    #[must_use]
    pub fn has_hard_error(&self) -> bool {
        self.checks.iter().any(|check| check.outcome.is_fail())
    }
}

/// Runs the ordered validator checks against `classification` for `case`,
/// returning the resulting status, checks, and any clarification questions.
#[must_use]
pub fn evaluate(
    case: &Case,
    classification: &CaseClassification,
    config: &caseflow_config::ValidatorConfig,
) -> ValidationOutcome {
    let mut checks = Vec::new();
    let mut questions = Vec::new();
    let mut forced_escalation = false;
    let mut requires_human_review = false;

    let bi = checks::bi_consistency(classification, config);
    forced_escalation |= bi.forces_escalation;
    requires_human_review |= bi.forces_review;
    checks.extend(bi.checks);

    checks.push(checks::record_type_consistency(classification));

    let category = checks::category_consistency(case, classification, config);
    questions.extend(category.questions);
    checks.extend(category.checks);

    checks.push(checks::confidence_threshold(classification, config));

    let risk_level = checks::risk_level(classification, config);

    let hard_error = checks.iter().any(|c| c.outcome.is_fail());
    let needs_clarification = !questions.is_empty();

    let status = if hard_error {
        GateStatus::Blocked
    } else if needs_clarification {
        GateStatus::ClarificationNeeded
    } else {
        GateStatus::Approved
    };

    let recommendations = checks::recommendations(&checks, classification);

    ValidationOutcome {
        status,
        checks,
        questions,
        forced_escalation,
        requires_human_review,
        recommendations,
        risk_level,
    }
}

/// Builds the `ValidationOutcome` for a case whose classification could not
/// be parsed (`STAGE_PARSE_ERROR` on its second retry).
#[must_use]
pub fn parse_failure_outcome() -> ValidationOutcome {
    ValidationOutcome {
        status: GateStatus::Blocked,
        checks: vec![Check::fail(
            "classification_parse",
            "classification pipeline failed to produce a valid result after retry",
        )],
        questions: Vec::new(),
        forced_escalation: false,
        requires_human_review: true,
        recommendations: vec!["escalate for manual categorization".to_string()],
        risk_level: RiskLevel::High,
    }
}

/// Assigns a stable id to the Nth question a check wants to ask, used so
/// repeated evaluation of the same case produces stable question ids for a
/// resumed clarification session.
#[must_use]
pub(crate) fn question_id(check_name: &str, index: usize) -> QuestionId {
    QuestionId::new(format!("{check_name}:{index}"))
}
