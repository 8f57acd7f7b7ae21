// crates/caseflow-escalation/src/lib.rs
// ============================================================================
// Module: Caseflow Escalation
// Description: Escalation trigger evaluation, rule-priority channel routing,
//              24-hour dedup, and Slack Block Kit payload construction.
// Purpose: Decide whether a case escalates, where, and post it exactly once.
// Dependencies: caseflow-core, caseflow-config, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! [`EscalationRouter::route`] is the single entry point: given a
//! classification already judged escalation-worthy by the caller (a forced
//! non-BAU escalation from the validator, or `route` discovering its own
//! BI/score/tone triggers), it selects a channel, checks the 24-hour dedup
//! window through [`caseflow_core::EscalationStore`], posts to Slack on a
//! fresh escalation, and writes an audit entry either way. Channel
//! selection and trigger detection are pure and exposed separately in
//! [`routing`] and [`trigger`] for the stuck-case monitor and tests to reuse
//! without a store or Slack client in hand.

pub mod routing;
pub mod slack_payload;
pub mod trigger;

use std::num::NonZeroU64;

use caseflow_config::EscalationConfig;
use caseflow_core::{
    AuditEntry, AuditEntryId, AuditSink, Case, CaseClassification, CoreError, Escalation,
    EscalationId, EscalationStatus, EscalationStore, SlackClient, SlackMessageRef, Timestamp,
};
use thiserror::Error;

pub use trigger::{composite_bi_score, determine_triggers};

/// Errors produced while routing an escalation.
#[derive(Debug, Error)]
pub enum EscalationRouterError {
    /// No routing rule matched (should be unreachable against validated
    /// config).
    #[error(transparent)]
    NoMatchingRule(#[from] routing::NoMatchingRuleError),
    /// A store or Slack call failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Placeholder id passed into [`AuditSink::append`]; concrete sinks assign
/// the real id and sequence number on write.
const PLACEHOLDER_AUDIT_ID: AuditEntryId = AuditEntryId::new(NonZeroU64::MIN);

/// Outcome of a [`EscalationRouter::route`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// No trigger fired; nothing was created.
    NotTriggered,
    /// A duplicate was found within the 24-hour window; a no-op audit entry
    /// was written, no new escalation was created.
    Deduplicated {
        /// The existing active escalation.
        existing: Escalation,
    },
    /// A new escalation was created and posted to Slack.
    Posted(Escalation),
}

/// Wires the escalation store and Slack client needed to route and post
/// escalations.
pub struct EscalationRouter<'a> {
    store: &'a dyn EscalationStore,
    slack: &'a dyn SlackClient,
    audit: &'a dyn AuditSink,
    config: &'a EscalationConfig,
}

impl<'a> EscalationRouter<'a> {
    /// Builds a router over the given store, Slack client, audit sink, and
    /// escalation configuration.
    #[must_use]
    pub const fn new(
        store: &'a dyn EscalationStore,
        slack: &'a dyn SlackClient,
        audit: &'a dyn AuditSink,
        config: &'a EscalationConfig,
    ) -> Self {
        Self {
            store,
            slack,
            audit,
            config,
        }
    }

    /// Evaluates whether `case`/`classification` should escalate, routes it
    /// to a channel, deduplicates against the 24-hour window, and posts to
    /// Slack on a fresh escalation.
    ///
    /// `forced_escalation` comes from the validator (e.g. a non-BAU
    /// category); `reason` is a human-readable justification surfaced in
    /// the Slack payload.
    ///
    /// # Errors
    /// Returns [`EscalationRouterError`] if channel selection or a store/
    /// Slack call fails. Audit-write failures never surface here; per
    /// audit writes here are best-effort.
    pub fn route(
        &self,
        case: &Case,
        classification: &CaseClassification,
        forced_escalation: bool,
        reason: &str,
    ) -> Result<RouteOutcome, EscalationRouterError> {
        let (triggers, score) = determine_triggers(
            classification,
            forced_escalation,
            self.config.business_intelligence.escalation_score_threshold,
        );
        if triggers.is_empty() {
            return Ok(RouteOutcome::NotTriggered);
        }

        if let Some(existing) = self.store.find_active_for_case(&case.number)? {
            self.best_effort_audit(AuditEntry {
                id: PLACEHOLDER_AUDIT_ID,
                entity_type: "escalation".to_string(),
                entity_id: case.number.clone(),
                action: "deduplicated".to_string(),
                prior_state: Some(serde_json::json!({ "existing_escalation_id": existing.id.to_string() })),
                new_state: serde_json::json!({ "status": "no_op" }),
                reason: Some(format!("active escalation already exists for case {}", case.number)),
                actor: "escalation_router".to_string(),
                performed_at: Timestamp::now(),
                metadata: serde_json::json!({ "triggers": triggers }),
                sequence: 0,
            });
            return Ok(RouteOutcome::Deduplicated { existing });
        }

        let assignment_group = case.assignment_group.as_deref().unwrap_or("");
        let rule = routing::select_channel(
            &self.config.routing_rules,
            &case.company,
            &classification.category,
            assignment_group,
        )?;

        let created = self.store.create(Escalation {
            id: EscalationId::new(NonZeroU64::MIN),
            case_number: case.number.clone(),
            triggers: triggers.clone(),
            bi_score: score,
            routing_rule_name: rule.name.clone(),
            channel: rule.channel.clone(),
            slack_message: None,
            status: EscalationStatus::Pending,
            created_at: Timestamp::now(),
            acknowledged_at: None,
        })?;

        let blocks = slack_payload::build_blocks(&created, case, reason);
        let (channel, ts) = self.slack.post_message(&rule.channel, None, blocks)?;
        let mut posted = created;
        posted.slack_message = Some(SlackMessageRef { channel, ts });
        posted.status = EscalationStatus::Posted;
        self.store.update(posted.clone())?;

        self.best_effort_audit(AuditEntry {
            id: PLACEHOLDER_AUDIT_ID,
            entity_type: "escalation".to_string(),
            entity_id: posted.id.to_string(),
            action: "posted".to_string(),
            prior_state: None,
            new_state: serde_json::to_value(&posted).unwrap_or(serde_json::Value::Null),
            reason: Some(reason.to_string()),
            actor: "escalation_router".to_string(),
            performed_at: Timestamp::now(),
            metadata: serde_json::json!({ "triggers": triggers, "bi_score": score }),
            sequence: 0,
        });

        Ok(RouteOutcome::Posted(posted))
    }

    /// Marks an escalation acknowledged, from a Slack interactivity button
    /// click.
    ///
    /// # Errors
    /// Returns [`CoreError`] if the escalation does not exist or the store
    /// write fails.
    pub fn acknowledge(&self, id: EscalationId) -> Result<Escalation, CoreError> {
        let mut escalation = self.store.get(id)?;
        escalation.status = EscalationStatus::Acknowledged;
        escalation.acknowledged_at = Some(Timestamp::now());
        self.store.update(escalation.clone())?;
        self.best_effort_audit(AuditEntry {
            id: PLACEHOLDER_AUDIT_ID,
            entity_type: "escalation".to_string(),
            entity_id: id.to_string(),
            action: "acknowledged".to_string(),
            prior_state: None,
            new_state: serde_json::to_value(&escalation).unwrap_or(serde_json::Value::Null),
            reason: None,
            actor: "slack_interactivity".to_string(),
            performed_at: Timestamp::now(),
            metadata: serde_json::Value::Null,
            sequence: 0,
        });
        Ok(escalation)
    }

    /// Writes an audit entry, discarding any failure:
    /// audit writes are best-effort and never fail the primary operation.
    fn best_effort_audit(&self, entry: AuditEntry) {
        let _ = self.audit.append(entry);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use caseflow_config::{BusinessIntelligenceThresholds, EscalationRoutingRule};
    use caseflow_core::{
        BiFlag, BusinessIntelligence, CaseId, Narrative, NarrativeTone, RecordTypeKind,
        RecordTypeSuggestion, TechnicalEntities, Urgency,
    };

    use super::*;

    struct FakeStore {
        active: RefCell<HashMap<String, Escalation>>,
    }

    impl EscalationStore for FakeStore {
        fn create(&self, mut escalation: Escalation) -> Result<Escalation, CoreError> {
            escalation.id = EscalationId::from_raw(1).unwrap_or(EscalationId::new(NonZeroU64::MIN));
            self.active
                .borrow_mut()
                .insert(escalation.case_number.clone(), escalation.clone());
            Ok(escalation)
        }

        fn get(&self, _id: EscalationId) -> Result<Escalation, CoreError> {
            self.active
                .borrow()
                .values()
                .next()
                .cloned()
                .ok_or(CoreError::NotFound { entity: "escalation", id: "?".to_string() })
        }

        fn update(&self, escalation: Escalation) -> Result<(), CoreError> {
            self.active.borrow_mut().insert(escalation.case_number.clone(), escalation);
            Ok(())
        }

        fn find_active_for_case(&self, case_number: &str) -> Result<Option<Escalation>, CoreError> {
            Ok(self
                .active
                .borrow()
                .get(case_number)
                .filter(|e| e.status.is_active())
                .cloned())
        }
    }

    struct FakeSlack;
    impl SlackClient for FakeSlack {
        fn post_message(
            &self,
            channel: &str,
            _thread_ts: Option<&str>,
            _blocks: serde_json::Value,
        ) -> Result<(String, String), CoreError> {
            Ok((channel.to_string(), "100.001".to_string()))
        }

        fn verify_signature(&self, _t: &str, _b: &[u8], _s: &str) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct FakeAudit;
    impl AuditSink for FakeAudit {
        fn append(&self, entry: AuditEntry) -> Result<AuditEntry, CoreError> {
            Ok(entry)
        }
    }

    fn config() -> EscalationConfig {
        EscalationConfig {
            default_channel_id: "C_DEFAULT".to_string(),
            business_intelligence: BusinessIntelligenceThresholds {
                escalation_score_threshold: 0.9,
            },
            routing_rules: vec![
                EscalationRoutingRule {
                    name: "compliance".to_string(),
                    priority: 10,
                    client: None,
                    category: Some("Compliance".to_string()),
                    assignment_group: None,
                    channel: "C_COMPLIANCE".to_string(),
                },
                EscalationRoutingRule {
                    name: "default".to_string(),
                    priority: 0,
                    client: None,
                    category: None,
                    assignment_group: None,
                    channel: "C_DEFAULT".to_string(),
                },
            ],
        }
    }

    fn case() -> Case {
        Case {
            id: CaseId::new("c-1"),
            number: "CS0001001".to_string(),
            short_description: "unauthorized PHI access".to_string(),
            long_description: None,
            priority: 1,
            urgency: 1,
            company: "Acme".to_string(),
            assignment_group: None,
            account: None,
            current_category: None,
        }
    }

    fn classification(category: &str, compliance: bool) -> CaseClassification {
        let mut bi = BusinessIntelligence::default();
        if compliance {
            bi.compliance_impact = BiFlag::set("PHI exposed");
        }
        CaseClassification {
            category: category.to_string(),
            subcategory: None,
            incident_category: None,
            incident_subcategory: None,
            confidence: Some(0.9),
            keywords: vec![],
            technical_entities: TechnicalEntities::default(),
            urgency: Urgency::Critical,
            record_type_suggestion: RecordTypeSuggestion {
                kind: RecordTypeKind::Incident,
                is_major: false,
                reasoning: String::new(),
            },
            service_offering: None,
            application_service: None,
            narrative: Narrative {
                quick_summary: String::new(),
                immediate_next_steps: vec!["contain exposure".to_string()],
                tone: NarrativeTone::Escalate,
            },
            business_intelligence: bi,
        }
    }

    #[test]
    fn routes_compliance_case_to_compliance_channel_once() {
        let store = FakeStore { active: RefCell::new(HashMap::new()) };
        let slack = FakeSlack;
        let audit = FakeAudit;
        let config = config();
        let router = EscalationRouter::new(&store, &slack, &audit, &config);

        let case = case();
        let classification = classification("Compliance", true);

        let outcome = router
            .route(&case, &classification, false, "compliance impact")
            .expect("routes");
        match outcome {
            RouteOutcome::Posted(escalation) => assert_eq!(escalation.channel, "C_COMPLIANCE"),
            other => panic!("expected Posted, got {other:?}"),
        }

        let second = router
            .route(&case, &classification, false, "compliance impact")
            .expect("routes");
        assert!(matches!(second, RouteOutcome::Deduplicated { .. }));
    }

    #[test]
    fn no_triggers_means_not_triggered() {
        let store = FakeStore { active: RefCell::new(HashMap::new()) };
        let slack = FakeSlack;
        let audit = FakeAudit;
        let config = config();
        let router = EscalationRouter::new(&store, &slack, &audit, &config);

        let case = case();
        let mut classification = classification("General", false);
        classification.narrative.tone = NarrativeTone::Confident;

        let outcome = router.route(&case, &classification, false, "none").expect("routes");
        assert_eq!(outcome, RouteOutcome::NotTriggered);
    }
}
