// crates/caseflow-pipeline/src/stages.rs
// ============================================================================
// Module: Classification Stages
// Description: Per-stage schemas, prompts, and the retry-once-then-fail
//              parsing contract shared by Categorization, Narrative, and
//              Business Intelligence.
// ============================================================================

use jsonschema::Draft;
use jsonschema::Validator;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;

use caseflow_core::{CoreError, LlmClient, RecordTypeSuggestion, TechnicalEntities, Urgency};

use crate::json_extract::extract_json;

/// The three ordered classification stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageName {
    /// Chooses category/subcategory, urgency, record type, service offering.
    Categorization,
    /// Produces the human-readable summary and next steps.
    Narrative,
    /// Derives evidence-grounded business-intelligence flags.
    BusinessIntelligence,
}

impl StageName {
    /// The stable label used in audit entries and error messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Categorization => "categorization",
            Self::Narrative => "narrative",
            Self::BusinessIntelligence => "business_intelligence",
        }
    }

    /// The stage's system prompt, describing its role and output contract.
    #[must_use]
    pub const fn system_prompt(self) -> &'static str {
        match self {
            Self::Categorization => {
                "You are the categorization stage of a service-desk case classifier. \
                 Choose the category, subcategory, urgency, and record-type suggestion \
                 for the case described below. Respond with a single JSON object \
                 matching the provided schema and nothing else."
            }
            Self::Narrative => {
                "You are the narrative stage of a service-desk case classifier. \
                 Write a 2-3 sentence quick summary and 1-5 concrete, ordered next \
                 steps (commands or paths where applicable). Respond with a single \
                 JSON object matching the provided schema and nothing else."
            }
            Self::BusinessIntelligence => {
                "You are the business-intelligence stage of a service-desk case \
                 classifier. Flag only what the case text provides direct evidence \
                 for; never speculate. Respond with a single JSON object matching \
                 the provided schema and nothing else."
            }
        }
    }

    /// Builds the compiled JSON schema this stage's output must validate
    /// against.
    ///
    /// # Panics
    /// Never, in practice: every schema here is a fixed literal known to
    /// compile; a panic would indicate a programmer error in this module.
    #[must_use]
    #[allow(clippy::missing_panics_doc, reason = "schemas are fixed literals, see panics note above")]
    pub fn schema(self) -> Validator {
        let raw = match self {
            Self::Categorization => categorization_schema(),
            Self::Narrative => narrative_schema(),
            Self::BusinessIntelligence => business_intelligence_schema(),
        };
        #[allow(clippy::expect_used, reason = "schema literals are authored and fixed in this module")]
        jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&raw)
            .expect("fixed stage schema literal must compile")
    }
}

fn categorization_schema() -> Value {
    json!({
        "type": "object",
        "required": ["category", "urgency", "record_type_suggestion", "keywords", "technical_entities"],
        "properties": {
            "category": { "type": "string", "minLength": 1 },
            "subcategory": { "type": ["string", "null"] },
            "incident_category": { "type": ["string", "null"] },
            "incident_subcategory": { "type": ["string", "null"] },
            "confidence": { "type": ["number", "null"], "minimum": 0.0, "maximum": 1.0 },
            "keywords": { "type": "array", "items": { "type": "string" } },
            "technical_entities": {
                "type": "object",
                "properties": {
                    "ip_addresses": { "type": "array", "items": { "type": "string" } },
                    "systems": { "type": "array", "items": { "type": "string" } },
                    "users": { "type": "array", "items": { "type": "string" } },
                    "software": { "type": "array", "items": { "type": "string" } },
                    "error_codes": { "type": "array", "items": { "type": "string" } }
                }
            },
            "urgency": { "enum": ["LOW", "MEDIUM", "HIGH", "CRITICAL"] },
            "record_type_suggestion": {
                "type": "object",
                "required": ["kind", "is_major", "reasoning"],
                "properties": {
                    "kind": { "enum": ["INCIDENT", "PROBLEM", "CHANGE", "CASE"] },
                    "is_major": { "type": "boolean" },
                    "reasoning": { "type": "string" }
                }
            },
            "service_offering": { "type": ["string", "null"] },
            "application_service": { "type": ["string", "null"] }
        }
    })
}

fn narrative_schema() -> Value {
    json!({
        "type": "object",
        "required": ["quick_summary", "immediate_next_steps", "tone"],
        "properties": {
            "quick_summary": { "type": "string", "minLength": 1 },
            "immediate_next_steps": {
                "type": "array",
                "items": { "type": "string" },
                "minItems": 1,
                "maxItems": 5
            },
            "tone": { "enum": ["confident", "cautious", "escalate"] }
        }
    })
}

fn business_intelligence_schema() -> Value {
    let flag = json!({
        "type": "object",
        "required": ["flagged"],
        "properties": {
            "flagged": { "type": "boolean" },
            "reason": { "type": ["string", "null"] }
        }
    });
    json!({
        "type": "object",
        "required": [
            "project_scope_detected", "executive_visibility", "compliance_impact",
            "financial_impact", "systemic_issue", "outside_service_hours"
        ],
        "properties": {
            "project_scope_detected": flag,
            "executive_visibility": flag,
            "compliance_impact": flag,
            "financial_impact": flag,
            "systemic_issue": flag,
            "outside_service_hours": flag
        }
    })
}

/// The categorization stage's typed output, merged into
/// [`caseflow_core::CaseClassification`] by the pipeline once all three
/// stages succeed.
#[derive(Debug, Clone, Deserialize)]
pub struct CategorizationOutput {
    /// Primary category.
    pub category: String,
    /// Subcategory, if chosen.
    pub subcategory: Option<String>,
    /// ServiceNow incident category, if record type was promoted.
    pub incident_category: Option<String>,
    /// ServiceNow incident subcategory, if record type was promoted.
    pub incident_subcategory: Option<String>,
    /// Confidence in `[0, 1]`.
    pub confidence: Option<f32>,
    /// Extracted keywords.
    pub keywords: Vec<String>,
    /// Extracted technical entities.
    pub technical_entities: TechnicalEntities,
    /// Assigned urgency.
    pub urgency: Urgency,
    /// Suggested ServiceNow record type.
    pub record_type_suggestion: RecordTypeSuggestion,
    /// Suggested service offering.
    pub service_offering: Option<String>,
    /// Suggested application service.
    pub application_service: Option<String>,
}

/// A parse/schema-validation failure for one attempt at a stage call. Does
/// not by itself mean the stage failed — the caller retries once before
/// surfacing [`crate::PipelineError::StageParseError`].
#[derive(Debug, Clone, Copy)]
pub struct StageAttemptFailed;

/// Calls `llm` once with `system_prompt`/`user_prompt`/`temperature`, then
/// extracts, schema-validates, and deserializes the response as `T`.
///
/// # Errors
/// Returns [`CoreError`] if the underlying LLM call fails, or
/// [`StageAttemptFailed`] wrapped in `Ok(Err(_))` if the response could not
/// be extracted, validated, or deserialized. The two are kept distinct so
/// the caller only retries on parse failure, never on a transport error.
pub fn attempt<T: DeserializeOwned>(
    llm: &dyn LlmClient,
    stage: StageName,
    system_prompt: &str,
    user_prompt: &str,
    temperature: f32,
    schema: &Validator,
) -> Result<Result<T, StageAttemptFailed>, CoreError> {
    let _ = stage;
    let raw = llm.complete(system_prompt, user_prompt, temperature)?;
    Ok(parse_with_schema(&raw, schema))
}

/// Extracts, validates, and deserializes one raw LLM completion.
fn parse_with_schema<T: DeserializeOwned>(raw: &str, schema: &Validator) -> Result<T, StageAttemptFailed> {
    let json_text = extract_json(raw).ok_or(StageAttemptFailed)?;
    let value: Value = serde_json::from_str(&json_text).map_err(|_| StageAttemptFailed)?;
    if !schema.is_valid(&value) {
        return Err(StageAttemptFailed);
    }
    serde_json::from_value(value).map_err(|_| StageAttemptFailed)
}

/// Appends a stricter "JSON only" reminder to a user prompt for the retry
/// attempt after a parse failure.
#[must_use]
pub fn with_strict_reminder(user_prompt: &str) -> String {
    format!(
        "{user_prompt}\n\nYour previous response could not be parsed. Respond with \
         ONLY the JSON object described by the schema: no commentary, no code \
         fences, no leading or trailing text."
    )
}

// Re-exported so downstream crates constructing a stage's output for tests
// or dry-run tooling don't need to depend on `caseflow-rules` to spell
// `RecordTypeKind`/`BusinessIntelligence` again.
pub use caseflow_core::{BusinessIntelligence as BiOutput, Narrative as NarrativeOutput};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorization_schema_accepts_a_well_formed_payload() {
        let schema = StageName::Categorization.schema();
        let value = json!({
            "category": "Network",
            "subcategory": null,
            "incident_category": null,
            "incident_subcategory": null,
            "confidence": 0.92,
            "keywords": ["vpn", "outage"],
            "technical_entities": { "ip_addresses": [], "systems": [], "users": [], "software": [], "error_codes": [] },
            "urgency": "HIGH",
            "record_type_suggestion": { "kind": "INCIDENT", "is_major": false, "reasoning": "clear outage" },
            "service_offering": null,
            "application_service": null
        });
        assert!(schema.is_valid(&value));
    }

    #[test]
    fn categorization_schema_rejects_missing_category() {
        let schema = StageName::Categorization.schema();
        let value = json!({
            "urgency": "HIGH",
            "keywords": [],
            "technical_entities": {},
            "record_type_suggestion": { "kind": "INCIDENT", "is_major": false, "reasoning": "x" }
        });
        assert!(!schema.is_valid(&value));
    }

    #[test]
    fn narrative_schema_rejects_too_many_steps() {
        let schema = StageName::Narrative.schema();
        let value = json!({
            "quick_summary": "ok",
            "immediate_next_steps": ["a", "b", "c", "d", "e", "f"],
            "tone": "confident"
        });
        assert!(!schema.is_valid(&value));
    }

    struct StubLlm(&'static str);
    impl LlmClient for StubLlm {
        fn complete(&self, _system: &str, _user: &str, _temperature: f32) -> Result<String, CoreError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn attempt_parses_a_valid_narrative_response() {
        let llm = StubLlm(r#"```json
{"quick_summary": "VPN concentrator restarted.", "immediate_next_steps": ["Restart concentrator"], "tone": "confident"}
```"#);
        let schema = StageName::Narrative.schema();
        let result: Result<NarrativeOutput, _> =
            attempt(&llm, StageName::Narrative, "sys", "user", 0.2, &schema).expect("llm call succeeds").expect("parses");
        assert_eq!(result.tone, caseflow_core::NarrativeTone::Confident);
    }

    #[test]
    fn attempt_reports_failure_on_unparseable_response() {
        let llm = StubLlm("not json at all");
        let schema = StageName::Narrative.schema();
        let result: Result<NarrativeOutput, _> =
            attempt(&llm, StageName::Narrative, "sys", "user", 0.2, &schema).expect("llm call succeeds");
        assert!(result.is_err());
    }
}
