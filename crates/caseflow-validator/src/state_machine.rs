// crates/caseflow-validator/src/state_machine.rs
// ============================================================================
// Module: Gate Status State Machine
// Description: Enforces the gate's directed transition graph for
//              `QualityGateRecord::status`, separately from the rule
//              evaluation in `checks.rs`.
// ============================================================================

use caseflow_core::GateStatus;
use thiserror::Error;

/// An event that can move a gate record from one status to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    /// The first evaluation of a freshly created gate approved it outright.
    InitialApprove,
    /// The first evaluation opened a clarification session.
    InitialClarificationNeeded,
    /// The first evaluation found a hard error.
    InitialBlock,
    /// A clarification session resolved and re-evaluation approved the gate.
    ClarificationApprove,
    /// A clarification session resolved and re-evaluation still blocks.
    ClarificationBlock,
    /// The linked clarification session expired unresolved.
    ClarificationExpire,
    /// A human reviewer explicitly rejected the case.
    ManualReject,
}

/// A transition that the gate's state machine does not permit.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("cannot apply {event:?} to a gate in status {from:?}")]
pub struct TransitionError {
    /// The status the gate was in when the event was applied.
    pub from: GateStatus,
    /// The event that was rejected.
    pub event: GateEvent,
}

/// Applies `event` to a gate currently in `from`, returning the resulting
/// status or a [`TransitionError`] if the event is not valid from `from`.
///
/// # Errors
/// Returns [`TransitionError`] if `event` is not reachable from `from` per
/// the directed graph this module documents: `NEW -> {APPROVED,
/// CLARIFICATION_NEEDED, BLOCKED}`; `CLARIFICATION_NEEDED -> {APPROVED,
/// BLOCKED, EXPIRED}`; `APPROVED`, `REJECTED`, `EXPIRED` are terminal.
pub fn transition(from: GateStatus, event: GateEvent) -> Result<GateStatus, TransitionError> {
    let to = match (from, event) {
        (GateStatus::New, GateEvent::InitialApprove) => GateStatus::Approved,
        (GateStatus::New, GateEvent::InitialClarificationNeeded) => GateStatus::ClarificationNeeded,
        (GateStatus::New, GateEvent::InitialBlock) => GateStatus::Blocked,
        (GateStatus::ClarificationNeeded, GateEvent::ClarificationApprove) => GateStatus::Approved,
        (GateStatus::ClarificationNeeded, GateEvent::ClarificationBlock) => GateStatus::Blocked,
        (GateStatus::ClarificationNeeded, GateEvent::ClarificationExpire) => GateStatus::Expired,
        (GateStatus::Blocked, GateEvent::ManualReject) => GateStatus::Rejected,
        (GateStatus::New, GateEvent::ManualReject) => GateStatus::Rejected,
        _ => return Err(TransitionError { from, event }),
    };
    Ok(to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_gate_can_reach_all_three_initial_outcomes() {
        assert_eq!(
            transition(GateStatus::New, GateEvent::InitialApprove),
            Ok(GateStatus::Approved)
        );
        assert_eq!(
            transition(GateStatus::New, GateEvent::InitialClarificationNeeded),
            Ok(GateStatus::ClarificationNeeded)
        );
        assert_eq!(
            transition(GateStatus::New, GateEvent::InitialBlock),
            Ok(GateStatus::Blocked)
        );
    }

    #[test]
    fn clarification_needed_cannot_expire_directly_to_approved_event() {
        assert_eq!(
            transition(GateStatus::ClarificationNeeded, GateEvent::ClarificationExpire),
            Ok(GateStatus::Expired)
        );
    }

    #[test]
    fn terminal_statuses_reject_further_transitions() {
        assert!(transition(GateStatus::Approved, GateEvent::ManualReject).is_err());
        assert!(transition(GateStatus::Expired, GateEvent::ClarificationApprove).is_err());
    }

    #[test]
    fn blocked_is_not_terminal_and_can_be_manually_rejected() {
        assert_eq!(
            transition(GateStatus::Blocked, GateEvent::ManualReject),
            Ok(GateStatus::Rejected)
        );
    }
}
