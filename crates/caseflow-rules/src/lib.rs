// crates/caseflow-rules/src/lib.rs
// ============================================================================
// Module: Caseflow Rules
// Description: Tri-state (Kleene) logic and the fixed Check vocabulary the
//              quality gate validator evaluates its rules with.
// Purpose: Give the validator a small, property-tested evaluation algebra
//          rather than ad hoc booleans scattered through rule bodies.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! `caseflow-rules` has no I/O and depends on nothing but `serde`. It is the
//! lowest leaf in the workspace's dependency order. [`TriState`] models
//! "true / false / unknown" with Kleene conjunction and disjunction so a
//! rule that cannot determine an answer (missing data, not "no") composes
//! correctly with the rules around it. [`Check`] and [`CheckOutcome`] are the
//! fixed vocabulary every validator rule in `caseflow-validator` returns.

use serde::Deserialize;
use serde::Serialize;

/// Three-valued logic: known-true, known-false, or indeterminate.
///
/// Conjunction and disjunction follow Kleene's strong logic: `Unknown`
/// dominates `True` under disjunction is `Unknown` only if the other operand
/// is not `True`; symmetric for conjunction against `False`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriState {
    /// The predicate is known to hold.
    True,
    /// The predicate is known not to hold.
    False,
    /// The predicate cannot be determined from available evidence.
    Unknown,
}

impl TriState {
    /// Lifts a plain boolean into a known `TriState`.
    #[must_use]
    pub const fn from_bool(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }

    /// Returns `true` only for [`TriState::True`].
    #[must_use]
    pub const fn is_true(self) -> bool {
        matches!(self, Self::True)
    }

    /// Kleene conjunction (strong AND).
    #[must_use]
    pub const fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::False, _) | (_, Self::False) => Self::False,
            (Self::True, Self::True) => Self::True,
            _ => Self::Unknown,
        }
    }

    /// Kleene disjunction (strong OR).
    #[must_use]
    pub const fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, _) | (_, Self::True) => Self::True,
            (Self::False, Self::False) => Self::False,
            _ => Self::Unknown,
        }
    }

    /// Kleene negation.
    #[must_use]
    pub const fn not(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Unknown => Self::Unknown,
        }
    }
}

/// The outcome of evaluating a single validator [`Check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// The check found nothing to report.
    Pass,
    /// The check found a soft issue; does not block approval on its own.
    Warn {
        /// Human-readable explanation of the warning.
        reason: String,
    },
    /// The check found a hard issue; blocks approval.
    Fail {
        /// Human-readable explanation of the failure.
        reason: String,
    },
}

impl CheckOutcome {
    /// Returns `true` if this outcome is [`CheckOutcome::Fail`].
    #[must_use]
    pub const fn is_fail(&self) -> bool {
        matches!(self, Self::Fail { .. })
    }

    /// Returns `true` if this outcome is [`CheckOutcome::Warn`].
    #[must_use]
    pub const fn is_warn(&self) -> bool {
        matches!(self, Self::Warn { .. })
    }

    /// Returns the outcome's reason text, if it carries one.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Pass => None,
            Self::Warn { reason } | Self::Fail { reason } => Some(reason.as_str()),
        }
    }
}

/// A named validator check and the outcome it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    /// Stable check name (e.g. `"bi_consistency"`), used in audit entries
    /// and test assertions.
    pub name: &'static str,
    /// The outcome this check produced.
    pub outcome: CheckOutcome,
}

impl Check {
    /// Builds a passing check.
    #[must_use]
    pub const fn pass(name: &'static str) -> Self {
        Self {
            name,
            outcome: CheckOutcome::Pass,
        }
    }

    /// Builds a warning check.
    #[must_use]
    pub fn warn(name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            name,
            outcome: CheckOutcome::Warn {
                reason: reason.into(),
            },
        }
    }

    /// Builds a failing check.
    #[must_use]
    pub fn fail(name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            name,
            outcome: CheckOutcome::Fail {
                reason: reason.into(),
            },
        }
    }
}

/// Reduces a slice of checks to the coarsest outcome: `Fail` if any check
/// failed, else `Warn` if any warned, else `Pass`.
#[must_use]
pub fn coarsest_outcome(checks: &[Check]) -> CheckOutcome {
    if let Some(check) = checks.iter().find(|c| c.outcome.is_fail()) {
        return check.outcome.clone();
    }
    if let Some(check) = checks.iter().find(|c| c.outcome.is_warn()) {
        return check.outcome.clone();
    }
    CheckOutcome::Pass
}
