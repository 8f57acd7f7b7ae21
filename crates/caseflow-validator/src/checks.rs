// crates/caseflow-validator/src/checks.rs
// ============================================================================
// Module: Validator Checks
// Description: The five ordered checks the quality gate runs, each returning
//              `caseflow_rules::Check` outcomes plus any side effects
//              (forced escalation, forced review, clarification questions).
// ============================================================================

use caseflow_config::ValidatorConfig;
use caseflow_core::{Case, CaseClassification, RecordTypeKind, RiskLevel};
use caseflow_rules::Check;

use crate::question_id;

/// Result of the BI consistency check (§4.4 check 1).
pub(crate) struct BiConsistency {
    pub(crate) checks: Vec<Check>,
    pub(crate) forces_escalation: bool,
    pub(crate) forces_review: bool,
}

/// Check 1: compliance implies incident; non-BAU implies escalation;
/// executive visibility implies human review.
pub(crate) fn bi_consistency(
    classification: &CaseClassification,
    config: &ValidatorConfig,
) -> BiConsistency {
    let mut checks = Vec::new();
    let mut forces_escalation = false;
    let mut forces_review = false;

    let bi = &classification.business_intelligence;

    if bi.compliance_impact.flagged
        && classification.record_type_suggestion.kind != RecordTypeKind::Incident
    {
        checks.push(Check::fail(
            "bi_compliance_requires_incident",
            "compliance_impact is flagged but the suggested record type is not Incident",
        ));
    } else if bi.compliance_impact.flagged {
        checks.push(Check::pass("bi_compliance_requires_incident"));
    }

    let is_bau = config
        .business_as_usual_categories
        .contains(&classification.category);
    if !config.business_as_usual_categories.is_empty() && !is_bau {
        checks.push(Check::warn(
            "bi_non_bau_requires_escalation",
            format!(
                "category \"{}\" is not configured as business-as-usual; routing through escalation",
                classification.category
            ),
        ));
        forces_escalation = true;
    }

    if bi.executive_visibility.flagged {
        checks.push(Check::warn(
            "bi_executive_requires_review",
            bi.executive_visibility
                .reason
                .clone()
                .unwrap_or_else(|| "executive visibility flagged".to_string()),
        ));
        forces_review = true;
    }

    if checks.is_empty() {
        checks.push(Check::pass("bi_consistency"));
    }

    BiConsistency {
        checks,
        forces_escalation,
        forces_review,
    }
}

/// Check 2: a systemic issue should be suggested as a Problem, not an
/// Incident; soft mismatch, never a hard error.
pub(crate) fn record_type_consistency(classification: &CaseClassification) -> Check {
    let bi = &classification.business_intelligence;
    if bi.systemic_issue.flagged
        && classification.record_type_suggestion.kind != RecordTypeKind::Problem
    {
        return Check::warn(
            "record_type_systemic_should_be_problem",
            "systemic_issue is flagged but the suggested record type is not Problem",
        );
    }
    Check::pass("record_type_systemic_should_be_problem")
}

/// Result of the category consistency check (§4.4 check 3).
pub(crate) struct CategoryConsistency {
    pub(crate) checks: Vec<Check>,
    pub(crate) questions: Vec<caseflow_core::QuestionSpec>,
}

/// Check 3: HR-required and high-risk category sets, each producing a
/// clarification question rather than a hard block.
pub(crate) fn category_consistency(
    case: &Case,
    classification: &CaseClassification,
    config: &ValidatorConfig,
) -> CategoryConsistency {
    let mut checks = Vec::new();
    let mut questions = Vec::new();

    let category_or_sub = [
        Some(classification.category.as_str()),
        classification.subcategory.as_deref(),
    ];
    let matches_hr = category_or_sub
        .iter()
        .flatten()
        .any(|value| config.hr_required_categories.contains(*value));
    let matches_high_risk = category_or_sub
        .iter()
        .flatten()
        .any(|value| config.high_risk_categories.contains(*value));

    if matches_hr {
        checks.push(Check::warn(
            "category_hr_requires_approval",
            format!("category \"{}\" requires HR approval before proceeding", classification.category),
        ));
        questions.push(caseflow_core::QuestionSpec {
            id: question_id("category_hr_requires_approval", 0),
            prompt: format!(
                "Case {} is categorized as HR-sensitive (\"{}\"). Has HR approved this request?",
                case.number, classification.category
            ),
            required: true,
        });
    } else {
        checks.push(Check::pass("category_hr_requires_approval"));
    }

    if matches_high_risk && !classification.business_intelligence.compliance_impact.flagged {
        checks.push(Check::warn(
            "category_high_risk_without_compliance_flag",
            format!(
                "category \"{}\" is high risk but no compliance_impact flag was raised",
                classification.category
            ),
        ));
        questions.push(caseflow_core::QuestionSpec {
            id: question_id("category_high_risk_without_compliance_flag", 0),
            prompt: format!(
                "Case {} falls under the high-risk category \"{}\". Does this involve regulatory or compliance impact?",
                case.number, classification.category
            ),
            required: true,
        });
    } else {
        checks.push(Check::pass("category_high_risk_without_compliance_flag"));
    }

    CategoryConsistency { checks, questions }
}

/// Check 4: confidence below threshold is a warning on its own; combined
/// with a compliance flag, it escalates to a hard block.
pub(crate) fn confidence_threshold(
    classification: &CaseClassification,
    config: &ValidatorConfig,
) -> Check {
    let confidence = classification.confidence.unwrap_or(0.0);
    if confidence >= config.confidence_threshold {
        return Check::pass("confidence_threshold");
    }

    if classification.business_intelligence.compliance_impact.flagged {
        return Check::fail(
            "confidence_threshold",
            format!(
                "confidence {confidence:.2} is below the {:.2} threshold and compliance_impact is flagged",
                config.confidence_threshold
            ),
        );
    }

    Check::warn(
        "confidence_threshold",
        format!(
            "confidence {confidence:.2} is below the {:.2} threshold",
            config.confidence_threshold
        ),
    )
}

/// Check 5: recommendations derived from whichever checks matched.
pub(crate) fn recommendations(checks: &[Check], classification: &CaseClassification) -> Vec<String> {
    let mut out = Vec::new();
    for check in checks {
        match check.name {
            "bi_non_bau_requires_escalation" => {
                out.push("route to the escalation channel for this category".to_string());
            }
            "record_type_systemic_should_be_problem" if check.outcome.is_warn() => {
                out.push("promote the suggested record type to Problem".to_string());
            }
            "category_hr_requires_approval" if check.outcome.is_warn() => {
                out.push("confirm HR approval before proceeding".to_string());
            }
            "category_high_risk_without_compliance_flag" if check.outcome.is_warn() => {
                out.push("confirm whether compliance impact applies".to_string());
            }
            "confidence_threshold" if !matches!(check.outcome, caseflow_rules::CheckOutcome::Pass) => {
                out.push("route to a human reviewer for category confirmation".to_string());
            }
            _ => {}
        }
    }
    if classification.narrative.tone == caseflow_core::NarrativeTone::Escalate {
        out.push("narrative stage recommends escalation".to_string());
    }
    out
}

/// Assigns a [`RiskLevel`] from the BI flags and configured high-risk
/// categories.
pub(crate) fn risk_level(classification: &CaseClassification, config: &ValidatorConfig) -> RiskLevel {
    let bi = &classification.business_intelligence;
    let is_high_risk_category = config.high_risk_categories.contains(&classification.category);
    if bi.compliance_impact.flagged || bi.financial_impact.flagged || is_high_risk_category {
        return RiskLevel::High;
    }
    if bi.flagged_count() > 0 {
        return RiskLevel::Medium;
    }
    RiskLevel::Low
}

#[cfg(test)]
mod tests {
    use caseflow_core::{
        BiFlag, BusinessIntelligence, Narrative, NarrativeTone, RecordTypeSuggestion,
        TechnicalEntities, Urgency,
    };

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
                reasoning: "vpn outage".to_string(),
            },
            service_offering: None,
            application_service: None,
            narrative: Narrative {
                quick_summary: "VPN is down for 20 users".to_string(),
                immediate_next_steps: vec!["restart vpn concentrator".to_string()],
                tone: NarrativeTone::Confident,
            },
            business_intelligence: BusinessIntelligence::default(),
        }
    }

    #[test]
    fn compliance_without_incident_is_hard_error() {
        let mut c = classification();
        c.business_intelligence.compliance_impact = BiFlag::set("PHI exposed");
        c.record_type_suggestion.kind = RecordTypeKind::Case;
        let result = bi_consistency(&c, &ValidatorConfig::default());
        assert!(result.checks.iter().any(|check| check.outcome.is_fail()));
    }

    #[test]
    fn hr_category_produces_required_question() {
        let case = caseflow_core::Case {
            id: caseflow_core::CaseId::new("c-1"),
            number: "CS0000001".to_string(),
            short_description: "add to finance share".to_string(),
            long_description: None,
            priority: 3,
            urgency: 3,
            company: "Acme".to_string(),
            assignment_group: None,
            account: None,
            current_category: None,
        };
        let mut c = classification();
        c.category = "HR Access".to_string();
        let mut config = ValidatorConfig::default();
        config.hr_required_categories.insert("HR Access".to_string());
        let result = category_consistency(&case, &c, &config);
        assert_eq!(result.questions.len(), 1);
        assert!(result.questions[0].required);
    }

    #[test]
    fn confidence_below_threshold_with_compliance_is_hard_error() {
        let mut c = classification();
        c.confidence = Some(0.4);
        c.business_intelligence.compliance_impact = BiFlag::set("regulated");
        let check = confidence_threshold(&c, &ValidatorConfig::default());
        assert!(check.outcome.is_fail());
    }

    #[test]
    fn confidence_below_threshold_alone_is_warning_only() {
        let mut c = classification();
        c.confidence = Some(0.4);
        let check = confidence_threshold(&c, &ValidatorConfig::default());
        assert!(check.outcome.is_warn());
    }
}
