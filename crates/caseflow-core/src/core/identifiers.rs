// crates/caseflow-core/src/core/identifiers.rs
// ============================================================================
// Module: Caseflow Identifiers
// Description: Canonical opaque identifiers for cases, gates, sessions, and
//              every other entity tracked by the orchestration engine.
// Purpose: Provide strongly typed, serializable identifiers with stable wire
//          forms so that "a string where an id belongs" is a compile error.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque and serialize as numbers or strings on the wire,
//! matching whatever the originating system (ServiceNow, Slack, our own
//! SQLite store) already uses as a primary key. Numeric identifiers enforce
//! non-zero, 1-based invariants at construction boundaries; string
//! identifiers carry through whatever the upstream system assigned.

use std::fmt;
use std::num::NonZeroU64;

use serde::Deserialize;
use serde::Serialize;

macro_rules! numeric_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(NonZeroU64);

        impl $name {
            /// Creates an identifier from a non-zero value.
            #[must_use]
            pub const fn new(id: NonZeroU64) -> Self {
                Self(id)
            }

            /// Creates an identifier from a raw value (returns `None` if zero).
            #[must_use]
            pub fn from_raw(raw: u64) -> Option<Self> {
                NonZeroU64::new(raw).map(Self)
            }

            /// Returns the raw identifier value (always >= 1).
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.get().fmt(f)
            }
        }
    };
}

macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from anything stringlike.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

numeric_id!(TenantId, "Tenant identifier scoping every entity below it.\n\n# Invariants\n- Always >= 1 (non-zero, 1-based).");
numeric_id!(GateId, "Quality gate record identifier.\n\n# Invariants\n- Always >= 1 (non-zero, 1-based), assigned by the gate store on creation.");
numeric_id!(SessionId, "Clarification session identifier.\n\n# Invariants\n- Always >= 1 (non-zero, 1-based), assigned by the session store on creation.");
numeric_id!(EscalationId, "Escalation record identifier.\n\n# Invariants\n- Always >= 1 (non-zero, 1-based), assigned by the escalation store on creation.");
numeric_id!(ExemplarId, "Muscle-memory exemplar identifier.\n\n# Invariants\n- Always >= 1 (non-zero, 1-based), assigned by the exemplar store on creation.");
numeric_id!(AuditEntryId, "Audit log entry identifier.\n\n# Invariants\n- Always >= 1 (non-zero, 1-based); monotonically increasing within a tenant.");

string_id!(CaseId, "Opaque ServiceNow case `sys_id`, as returned by the case repository.\n\n# Invariants\n- Opaque UTF-8 string; no normalization is applied by this type.");
string_id!(QuestionId, "Identifier of a single clarification question within a session.\n\n# Invariants\n- Opaque UTF-8 string, unique within the owning session's `questions` list.");
string_id!(CorrelationId, "Cross-cutting correlation id threading one case through every log line and audit entry touching it.\n\n# Invariants\n- Opaque UTF-8 string, generated once at intake and carried unchanged thereafter.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_id_rejects_zero() {
        assert!(GateId::from_raw(0).is_none());
        assert_eq!(GateId::from_raw(7).map(GateId::get), Some(7));
    }

    #[test]
    fn string_id_round_trips_through_json() {
        let id = CaseId::new("c-001");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"c-001\"");
        let back: CaseId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn numeric_id_displays_as_bare_integer() {
        let id = GateId::from_raw(42).expect("nonzero");
        assert_eq!(id.to_string(), "42");
    }
}
