// crates/caseflow-server/src/overview.rs
// ============================================================================
// Module: Overview Artifact
// Description: Renders and validates the five-section case overview posted
//              to Slack and ServiceNow work notes after a case is approved.
// Purpose: `spec.md` §6 requires `Summary / Current State / Latest Activity /
//          Context / References` section headers on overview artifacts;
//          §8 Testable Property 5 exempts short field-query replies from
//          that shape. One render function and one validator keep both
//          posting sites (work note, Slack message) honest against the same
//          rule.
// Dependencies: caseflow-core, serde_json
// ============================================================================

//! ## Overview
//! [`render`] always produces a compliant artifact; [`validate`] exists so a
//! caller assembling an overview from parts it does not fully control (a
//! hand-written note, a future templating path) can check the result before
//! posting it. Below [`FIELD_QUERY_MAX_LEN`] characters, an artifact is
//! treated as a field query and exempted from the section-header
//! requirement, per `spec.md` §8 Testable Property 5.

use caseflow_core::Case;
use caseflow_core::CaseClassification;
use serde_json::Value;
use serde_json::json;

/// The five required section headers, in the order `spec.md` §6 fixes.
pub const REQUIRED_SECTIONS: [&str; 5] = ["Summary", "Current State", "Latest Activity", "Context", "References"];

/// Artifacts at or above this length must carry the five section headers;
/// shorter ones are treated as field queries and exempted.
pub const FIELD_QUERY_MAX_LEN: usize = 80;

/// Why an overview artifact failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverviewValidationError {
    /// A required section header is missing, or present out of order.
    #[error("missing or out-of-order section header {0:?}")]
    MissingSection(&'static str),
}

/// Validates `artifact` against `spec.md` §8 Testable Property 5: below
/// [`FIELD_QUERY_MAX_LEN`] characters it passes unconditionally; at or above
/// it, every entry of [`REQUIRED_SECTIONS`] must appear, in order.
///
/// # Errors
/// Returns [`OverviewValidationError::MissingSection`] naming the first
/// header that is missing or appears out of order.
pub fn validate(artifact: &str) -> Result<(), OverviewValidationError> {
    if artifact.chars().count() < FIELD_QUERY_MAX_LEN {
        return Ok(());
    }
    let mut cursor = 0;
    for section in REQUIRED_SECTIONS {
        let found = artifact[cursor..].find(section).ok_or(OverviewValidationError::MissingSection(section))?;
        cursor += found + section.len();
    }
    Ok(())
}

/// Renders the plain-text overview artifact for a classified, approved case:
/// the five sections in order, suitable for a ServiceNow work note or a
/// Slack section block's `mrkdwn` text.
#[must_use]
pub fn render(case: &Case, classification: &CaseClassification) -> String {
    let current_state = format!(
        "Category {}, urgency {:?}, confidence {}.",
        classification.category,
        classification.urgency,
        classification
            .confidence
            .map_or_else(|| "unknown".to_string(), |value| format!("{value:.2}")),
    );
    let latest_activity = classification
        .narrative
        .immediate_next_steps
        .first()
        .map_or_else(|| "No immediate next step was recommended.".to_string(), |step| step.clone());
    let context = if classification.keywords.is_empty() {
        format!("Company {}.", case.company)
    } else {
        format!("Company {}. Keywords: {}.", case.company, classification.keywords.join(", "))
    };
    let references = format!("Case {} ({}).", case.number, case.id);

    format!(
        "Summary\n{}\n\nCurrent State\n{current_state}\n\nLatest Activity\n{latest_activity}\n\nContext\n{context}\n\nReferences\n{references}",
        classification.narrative.quick_summary,
    )
}

/// Builds the Block Kit `blocks` array for an approved-case overview post,
/// in the same shape [`caseflow_escalation::slack_payload`] uses for
/// escalation posts: a header naming the case, then one section per overview
/// entry produced by [`render`].
#[must_use]
pub fn build_blocks(case: &Case, classification: &CaseClassification) -> Value {
    json!([
        {
            "type": "header",
            "text": { "type": "plain_text", "text": format!("Case {} approved", case.number), "emoji": true }
        },
        {
            "type": "section",
            "text": { "type": "mrkdwn", "text": render(case, classification) }
        }
    ])
}

#[cfg(test)]
mod tests {
    use caseflow_core::CaseId;
    use caseflow_core::NarrativeTone;
    use caseflow_core::RecordTypeKind;
    use caseflow_core::RecordTypeSuggestion;
    use caseflow_core::Urgency;

    use super::*;

    fn sample_case() -> Case {
        Case {
            id: CaseId::new("c-1"),
            number: "CS0000001".to_string(),
            short_description: "VPN down".to_string(),
            long_description: None,
            priority: 1,
            urgency: 1,
            company: "Acme".to_string(),
            assignment_group: None,
            account: None,
            current_category: None,
        }
    }

    fn sample_classification() -> CaseClassification {
        CaseClassification {
            category: "Network".to_string(),
            subcategory: None,
            incident_category: None,
            incident_subcategory: None,
            confidence: Some(0.82),
            keywords: vec!["vpn".to_string()],
            technical_entities: caseflow_core::TechnicalEntities::default(),
            urgency: Urgency::High,
            record_type_suggestion: RecordTypeSuggestion {
                kind: RecordTypeKind::Incident,
                is_major: false,
                reasoning: "VPN outage affects many users".to_string(),
            },
            service_offering: None,
            application_service: None,
            narrative: caseflow_core::Narrative {
                quick_summary: "VPN is down for twenty users at the Acme site.".to_string(),
                immediate_next_steps: vec!["Restart the VPN concentrator.".to_string()],
                tone: NarrativeTone::Confident,
            },
            business_intelligence: caseflow_core::BusinessIntelligence::default(),
        }
    }

    #[test]
    fn rendered_overview_passes_validation() {
        let artifact = render(&sample_case(), &sample_classification());
        assert!(validate(&artifact).is_ok());
    }

    #[test]
    fn short_field_query_is_exempt_without_sections() {
        assert!(validate("when was this case last touched?").is_ok());
    }

    #[test]
    fn long_artifact_missing_a_section_is_rejected() {
        let artifact = "x".repeat(120);
        assert_eq!(validate(&artifact), Err(OverviewValidationError::MissingSection("Summary")));
    }

    #[test]
    fn out_of_order_sections_are_rejected() {
        let mut artifact = format!("{} filler text to push this past the eighty character field-query exemption threshold for sure.", REQUIRED_SECTIONS[1]);
        artifact.push_str(REQUIRED_SECTIONS[0]);
        assert!(validate(&artifact).is_err());
    }
}
