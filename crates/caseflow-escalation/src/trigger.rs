// crates/caseflow-escalation/src/trigger.rs
// ============================================================================
// Module: Escalation Trigger Detection
// Description: Decides whether a classification should escalate, and why,
//              per the configured business-intelligence thresholds.
// ============================================================================

use caseflow_core::{BusinessIntelligence, CaseClassification, EscalationTrigger, NarrativeTone};

/// Total number of business-intelligence flags the composite score is
/// computed over.
const BI_FLAG_COUNT: f32 = 6.0;

/// Computes the composite business-intelligence score: the fraction of BI
/// flags currently set, in `[0, 1]`.
#[must_use]
pub fn composite_bi_score(bi: &BusinessIntelligence) -> f32 {
    #[allow(
        clippy::cast_precision_loss,
        reason = "flagged_count is bounded by BI_FLAG_COUNT (6), well within f32 exact-integer range"
    )]
    let flagged = bi.flagged_count() as f32;
    flagged / BI_FLAG_COUNT
}

/// Determines every trigger that fires for `classification`, given whether
/// the validator already flagged this case for forced escalation (e.g. a
/// non-BAU category) and the configured composite-score threshold.
#[must_use]
pub fn determine_triggers(
    classification: &CaseClassification,
    forced_escalation: bool,
    score_threshold: f32,
) -> (Vec<EscalationTrigger>, f32) {
    let mut triggers = Vec::new();
    let bi = &classification.business_intelligence;
    let score = composite_bi_score(bi);

    if bi.flagged_count() > 0 {
        triggers.push(EscalationTrigger::BusinessIntelligenceFlag);
    }
    if score >= score_threshold {
        triggers.push(EscalationTrigger::CompositeScoreThreshold);
    }
    if forced_escalation {
        triggers.push(EscalationTrigger::NonBau);
    }
    if classification.narrative.tone == NarrativeTone::Escalate {
        triggers.push(EscalationTrigger::NarrativeEscalateTone);
    }

    (triggers, score)
}

#[cfg(test)]
mod tests {
    use caseflow_core::{BiFlag, Narrative, RecordTypeKind, RecordTypeSuggestion, TechnicalEntities, Urgency};

    use super::*;

    fn classification() -> CaseClassification {
        CaseClassification {
            category: "Network".to_string(),
            subcategory: None,
            incident_category: None,
            incident_subcategory: None,
            confidence: Some(0.9),
            keywords: vec![],
            technical_entities: TechnicalEntities::default(),
            urgency: Urgency::Medium,
            record_type_suggestion: RecordTypeSuggestion {
                kind: RecordTypeKind::Incident,
                is_major: false,
                reasoning: String::new(),
            },
            service_offering: None,
            application_service: None,
            narrative: Narrative {
                quick_summary: String::new(),
                immediate_next_steps: vec!["step".to_string()],
                tone: NarrativeTone::Confident,
            },
            business_intelligence: BusinessIntelligence::default(),
        }
    }

    #[test]
    fn no_flags_no_triggers() {
        let c = classification();
        let (triggers, score) = determine_triggers(&c, false, 0.5);
        assert!(triggers.is_empty());
        assert_eq!(score, 0.0);
    }

    #[test]
    fn compliance_flag_triggers_bi_flag() {
        let mut c = classification();
        c.business_intelligence.compliance_impact = BiFlag::set("PHI exposed");
        let (triggers, _) = determine_triggers(&c, false, 0.99);
        assert!(triggers.contains(&EscalationTrigger::BusinessIntelligenceFlag));
    }

    #[test]
    fn composite_score_threshold_fires_independently() {
        let mut c = classification();
        c.business_intelligence.compliance_impact = BiFlag::set("a");
        c.business_intelligence.financial_impact = BiFlag::set("b");
        c.business_intelligence.executive_visibility = BiFlag::set("c");
        let (triggers, score) = determine_triggers(&c, false, 0.4);
        assert!(score >= 0.4);
        assert!(triggers.contains(&EscalationTrigger::CompositeScoreThreshold));
    }
}
