// crates/caseflow-clarification/src/lib.rs
// ============================================================================
// Module: Caseflow Clarification
// Description: Lifecycle operations on `ClarificationSession`: open, record
//              a response, expire, resolve, resume, and the reminder
//              schedule.
// Purpose: Keep the session's allowed transitions in one place so the
//          server's cron and Slack-interactivity handlers never mutate
//          `status` directly.
// Dependencies: caseflow-core, serde, thiserror, time
// ============================================================================

//! ## Overview
//! Every mutator here takes `&mut ClarificationSession` and returns
//! `Result<(), ClarificationError>`; none of them perform I/O. Persisting
//! the result through [`caseflow_core::SessionStore`] and deciding *when*
//! to call `expire`/`send_reminder` (the periodic sweep) is
//! the caller's job — this crate only enforces that the resulting state is
//! one the session's state machine actually allows.

use caseflow_core::{ClarificationSession, QuestionId, SessionError, SessionStatus, Timestamp};
use thiserror::Error;

/// An error produced while mutating a [`ClarificationSession`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClarificationError {
    /// The response targeted a question the session never asked.
    #[error(transparent)]
    UnknownQuestion(#[from] SessionError),
    /// The requested transition is not reachable from the session's current
    /// status.
    #[error("cannot move session {case_number} from {from:?} via this operation")]
    InvalidTransition {
        /// The case number, for error context.
        case_number: String,
        /// The status the session was in.
        from: SessionStatus,
    },
}

/// Opens a new clarification session in `ACTIVE` status.
#[must_use]
pub fn open(
    id: caseflow_core::SessionId,
    case_id: caseflow_core::CaseId,
    case_number: String,
    questions: Vec<caseflow_core::QuestionSpec>,
    linked_gate_id: caseflow_core::GateId,
    expires_at: Timestamp,
    slack_channel: Option<String>,
    slack_thread_ts: Option<String>,
) -> ClarificationSession {
    ClarificationSession {
        id,
        case_id,
        case_number,
        questions,
        responses: std::collections::BTreeMap::new(),
        expires_at,
        status: SessionStatus::Active,
        slack_channel,
        slack_thread_ts,
        linked_gate_id,
        reminders_sent: 0,
    }
}

/// Records a user's answer. If every required question now has a response,
/// the session transitions `ACTIVE -> RESPONDED`.
///
/// # Errors
/// Returns [`ClarificationError::UnknownQuestion`] if `question_id` is not
/// part of the session, or [`ClarificationError::InvalidTransition`] if the
/// session is not currently `ACTIVE`.
pub fn record_response(
    session: &mut ClarificationSession,
    question_id: QuestionId,
    value: impl Into<String>,
) -> Result<(), ClarificationError> {
    if session.status != SessionStatus::Active {
        return Err(ClarificationError::InvalidTransition {
            case_number: session.case_number.clone(),
            from: session.status,
        });
    }
    session.record_response(question_id, value)?;
    if session.all_required_answered() {
        session.status = SessionStatus::Responded;
    }
    Ok(())
}

/// Marks an `ACTIVE` session `EXPIRED`. Called by the periodic sweep when
/// `now > expires_at`.
///
/// # Errors
/// Returns [`ClarificationError::InvalidTransition`] if the session is not
/// currently `ACTIVE`.
pub fn expire(session: &mut ClarificationSession) -> Result<(), ClarificationError> {
    transition(session, SessionStatus::Active, SessionStatus::Expired)
}

/// Cancels an `ACTIVE` session by manual operator command.
///
/// # Errors
/// Returns [`ClarificationError::InvalidTransition`] if the session is not
/// currently `ACTIVE`.
pub fn cancel(session: &mut ClarificationSession) -> Result<(), ClarificationError> {
    transition(session, SessionStatus::Active, SessionStatus::Cancelled)
}

/// Marks a `RESPONDED` session `RESOLVED`, once the validator has
/// re-evaluated the case with the recorded responses and approved it.
///
/// # Errors
/// Returns [`ClarificationError::InvalidTransition`] if the session is not
/// currently `RESPONDED`.
pub fn resolve(session: &mut ClarificationSession) -> Result<(), ClarificationError> {
    transition(session, SessionStatus::Responded, SessionStatus::Resolved)
}

/// Marks a `RESOLVED` session `RESUMED`, once downstream processing (the
/// finalized decision's side effects) has continued.
///
/// # Errors
/// Returns [`ClarificationError::InvalidTransition`] if the session is not
/// currently `RESOLVED`.
pub fn resume(session: &mut ClarificationSession) -> Result<(), ClarificationError> {
    transition(session, SessionStatus::Resolved, SessionStatus::Resumed)
}

/// Moves `session` from `expected` to `next`, or returns
/// [`ClarificationError::InvalidTransition`] if it is not currently in
/// `expected`.
fn transition(
    session: &mut ClarificationSession,
    expected: SessionStatus,
    next: SessionStatus,
) -> Result<(), ClarificationError> {
    if session.status != expected {
        return Err(ClarificationError::InvalidTransition {
            case_number: session.case_number.clone(),
            from: session.status,
        });
    }
    session.status = next;
    Ok(())
}

/// Returns `true` if `now` is past `session.expires_at` and the session is
/// still `ACTIVE` (i.e. it should be expired by the next sweep).
#[must_use]
pub fn is_overdue(session: &ClarificationSession, now: Timestamp) -> bool {
    session.status == SessionStatus::Active && now > session.expires_at
}

/// Per-project/client reminder cadence, mirrored from
/// `caseflow_config::ClarificationReminderPolicy` so this crate does not
/// need to depend on `caseflow-config` for a two-field struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    /// Minutes before `expires_at` the last reminder fires.
    pub reminder_lead_minutes: u32,
    /// Maximum number of reminders ever sent for one session.
    pub max_reminders: u32,
}

/// Returns `true` if `session` is due another reminder at `now`.
///
/// Reminders are spaced `reminder_lead_minutes` apart, counting backward
/// from `expires_at`: with `max_reminders = 2` and `reminder_lead_minutes =
/// 60`, the first reminder is due two hours before expiry and the second
/// one hour before expiry.
#[must_use]
pub fn reminder_due(session: &ClarificationSession, now: Timestamp, policy: ReminderPolicy) -> bool {
    if session.status != SessionStatus::Active {
        return false;
    }
    if session.reminders_sent >= policy.max_reminders {
        return false;
    }
    let remaining = u64::from(policy.max_reminders - session.reminders_sent);
    let lead = time::Duration::minutes(i64::from(policy.reminder_lead_minutes) * i64::try_from(remaining).unwrap_or(i64::MAX));
    let Some(threshold) = session.expires_at.as_offset_date_time().checked_sub(lead) else {
        return false;
    };
    now.as_offset_date_time() >= threshold
}

/// Records that a reminder was sent, advancing `reminders_sent`.
pub fn record_reminder_sent(session: &mut ClarificationSession) {
    session.reminders_sent += 1;
}

#[cfg(test)]
mod tests {
    use caseflow_core::{CaseId, GateId, QuestionSpec, SessionId};

    use super::*;

    fn session(expires_in_minutes: i64) -> ClarificationSession {
        let now = Timestamp::now();
        let expires_at = now
            .checked_add(time::Duration::minutes(expires_in_minutes))
            .expect("valid");
        open(
            SessionId::from_raw(1).expect("nonzero"),
            CaseId::new("c-1"),
            "CS0000001".to_string(),
            vec![QuestionSpec {
                id: QuestionId::new("q1"),
                prompt: "HR approved?".to_string(),
                required: true,
            }],
            GateId::from_raw(1).expect("nonzero"),
            expires_at,
            Some("C123".to_string()),
            Some("123.456".to_string()),
        )
    }

    #[test]
    fn recording_all_required_answers_transitions_to_responded() {
        let mut s = session(60);
        record_response(&mut s, QuestionId::new("q1"), "yes").expect("records");
        assert_eq!(s.status, SessionStatus::Responded);
    }

    #[test]
    fn expire_requires_active_status() {
        let mut s = session(60);
        record_response(&mut s, QuestionId::new("q1"), "yes").expect("records");
        assert!(expire(&mut s).is_err());
    }

    #[test]
    fn full_lifecycle_active_to_resumed() {
        let mut s = session(60);
        record_response(&mut s, QuestionId::new("q1"), "yes").expect("records");
        resolve(&mut s).expect("resolve");
        assert_eq!(s.status, SessionStatus::Resolved);
        resume(&mut s).expect("resume");
        assert_eq!(s.status, SessionStatus::Resumed);
    }

    #[test]
    fn is_overdue_detects_past_expiry() {
        let s = session(-1);
        assert!(is_overdue(&s, Timestamp::now()));
    }

    #[test]
    fn reminder_due_fires_within_lead_window() {
        let s = session(30);
        let policy = ReminderPolicy {
            reminder_lead_minutes: 60,
            max_reminders: 2,
        };
        assert!(reminder_due(&s, Timestamp::now(), policy));
    }

    #[test]
    fn reminder_not_due_far_from_expiry() {
        let s = session(600);
        let policy = ReminderPolicy {
            reminder_lead_minutes: 60,
            max_reminders: 2,
        };
        assert!(!reminder_due(&s, Timestamp::now(), policy));
    }
}
