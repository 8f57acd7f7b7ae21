// crates/caseflow-pipeline/src/lib.rs
// ============================================================================
// Crate: caseflow-pipeline
// Description: Context Loader, three-stage classification pipeline, and
//              muscle-memory retrieval/recording.
// ============================================================================

//! Context Loader, three-stage classification pipeline, and muscle-memory
//! retrieval/recording for a single case classification run.

pub mod context_loader;
pub mod json_extract;
pub mod muscle_memory;
pub mod stages;

use caseflow_config::PipelineConfig;
use caseflow_core::{BusinessIntelligence, CaseClassification, ContextPack, CoreError, LlmClient, Narrative};
use thiserror::Error;

use stages::{CategorizationOutput, StageName};

pub use context_loader::ContextLoader;
pub use muscle_memory::MuscleMemoryRetriever;

/// Failure modes specific to running the classification pipeline, distinct
/// from the backend failures [`CoreError`] already covers.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A backend call (the LLM client) failed outright.
    #[error(transparent)]
    Core(#[from] CoreError),
    /// A stage's response could not be extracted, schema-validated, or
    /// deserialized even after one retry with a stricter reminder. Callers
    /// are expected to open a `BLOCKED`/`risk=high` quality gate rather than
    /// invoking the validator on a classification that never completed.
    #[error("stage {stage} failed to produce a valid response after retry")]
    StageParseError {
        /// The stage that failed, e.g. `"categorization"`.
        stage: &'static str,
    },
}

/// Runs the three ordered classification stages over a [`ContextPack`] and
/// merges their outputs into a [`CaseClassification`].
pub struct ClassificationPipeline<'a> {
    llm: &'a dyn LlmClient,
    config: &'a PipelineConfig,
}

impl<'a> ClassificationPipeline<'a> {
    /// Builds a pipeline over the given LLM client and stage configuration.
    #[must_use]
    pub const fn new(llm: &'a dyn LlmClient, config: &'a PipelineConfig) -> Self {
        Self { llm, config }
    }

    /// Runs Categorization, then Narrative, then Business Intelligence,
    /// strictly in sequence — a later stage never starts before the
    /// previous stage's result has validated. Returns the merged
    /// classification.
    ///
    /// # Errors
    /// Returns [`PipelineError::Core`] if the LLM client itself fails, or
    /// [`PipelineError::StageParseError`] if a stage's response fails to
    /// parse/validate twice in a row.
    pub fn run(&self, context: &ContextPack) -> Result<CaseClassification, PipelineError> {
        let shared_context = render_context(context);

        let categorization: CategorizationOutput = self.run_stage(
            StageName::Categorization,
            &shared_context,
            self.config.categorization_temperature,
        )?;

        let narrative_prompt = format!(
            "{shared_context}\n\nCATEGORIZATION RESULT:\n{}",
            serde_json::to_string_pretty(&categorization_summary(&categorization)).unwrap_or_default()
        );
        let narrative: Narrative =
            self.run_stage(StageName::Narrative, &narrative_prompt, self.config.narrative_temperature)?;

        let bi_prompt = format!(
            "{narrative_prompt}\n\nNARRATIVE RESULT:\n{}",
            serde_json::to_string_pretty(&narrative).unwrap_or_default()
        );
        let business_intelligence: BusinessIntelligence = self.run_stage(
            StageName::BusinessIntelligence,
            &bi_prompt,
            self.config.business_intelligence_temperature,
        )?;

        Ok(CaseClassification {
            category: categorization.category,
            subcategory: categorization.subcategory,
            incident_category: categorization.incident_category,
            incident_subcategory: categorization.incident_subcategory,
            confidence: categorization.confidence,
            keywords: categorization.keywords,
            technical_entities: categorization.technical_entities,
            urgency: categorization.urgency,
            record_type_suggestion: categorization.record_type_suggestion,
            service_offering: categorization.service_offering,
            application_service: categorization.application_service,
            narrative,
            business_intelligence,
        })
    }

    /// Runs a single stage, retrying once with a stricter "JSON only"
    /// reminder if the first attempt fails to parse or validate.
    fn run_stage<T: serde::de::DeserializeOwned>(
        &self,
        stage: StageName,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<T, PipelineError> {
        let schema = stage.schema();
        let system_prompt = stage.system_prompt();

        if let Ok(value) = stages::attempt(self.llm, stage, system_prompt, user_prompt, temperature, &schema)? {
            return Ok(value);
        }

        let retry_prompt = stages::with_strict_reminder(user_prompt);
        stages::attempt(self.llm, stage, system_prompt, &retry_prompt, temperature, &schema)?
            .map_err(|_| PipelineError::StageParseError { stage: stage.label() })
    }
}

/// Renders the deterministic shared context every stage sees: the case
/// itself, business context, similar cases, knowledge-base articles, and a
/// MUSCLE MEMORY section present only when the pack carries exemplars.
fn render_context(context: &ContextPack) -> String {
    let mut out = String::new();
    out.push_str("CASE:\n");
    out.push_str(&format!("number: {}\n", context.case.number));
    out.push_str(&format!("short_description: {}\n", context.case.short_description));
    if let Some(long) = &context.case.long_description {
        out.push_str(&format!("long_description: {long}\n"));
    }
    out.push_str(&format!("company: {}\n", context.case.company));
    if let Some(account) = &context.case.account {
        out.push_str(&format!("account: {account}\n"));
    }

    if let Some(business_context) = &context.business_context {
        out.push_str("\nBUSINESS CONTEXT:\n");
        out.push_str(&format!("entity: {}\n", business_context.entity_name));
        if let Some(tier) = &business_context.tier {
            out.push_str(&format!("tier: {tier}\n"));
        }
        out.push_str(&format!("compliance_sensitive: {}\n", business_context.compliance_sensitive));
    }

    if !context.similar_cases.is_empty() {
        out.push_str("\nSIMILAR PRIOR CASES:\n");
        for similar in &context.similar_cases {
            out.push_str(&format!(
                "- {} ({}): {}\n",
                similar.case_number, similar.similarity, similar.short_description
            ));
            if let Some(resolution) = &similar.resolution_summary {
                out.push_str(&format!("  resolution: {resolution}\n"));
            }
        }
    }

    if !context.kb_articles.is_empty() {
        out.push_str("\nKNOWLEDGE BASE ARTICLES:\n");
        for article in &context.kb_articles {
            out.push_str(&format!("- [{}] {}: {}\n", article.article_id, article.title, article.excerpt));
        }
    }

    if !context.exemplars.is_empty() {
        out.push_str("\nMUSCLE MEMORY:\n");
        for exemplar in &context.exemplars {
            out.push_str(&format!(
                "- action: {} | outcome: {} | quality: {:.2}\n",
                exemplar.action_taken, exemplar.outcome, exemplar.quality_score
            ));
        }
    }

    out
}

/// A trimmed view of the categorization output used only to render the
/// intermediate "CATEGORIZATION RESULT" block the later stages see, without
/// re-serializing fields they don't need.
fn categorization_summary(categorization: &CategorizationOutput) -> serde_json::Value {
    serde_json::json!({
        "category": categorization.category,
        "subcategory": categorization.subcategory,
        "urgency": categorization.urgency,
        "keywords": categorization.keywords,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use caseflow_core::{Case, CaseId};

    use super::*;

    struct ScriptedLlm {
        responses: Mutex<Vec<&'static str>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<&'static str>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    impl LlmClient for ScriptedLlm {
        fn complete(&self, _system: &str, _user: &str, _temperature: f32) -> Result<String, CoreError> {
            let mut responses = self.responses.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if responses.is_empty() {
                return Err(CoreError::Transient {
                    operation: "complete",
                    detail: "no more scripted responses".to_string(),
                });
            }
            Ok(responses.remove(0).to_string())
        }
    }

    fn context() -> ContextPack {
        ContextPack {
            case: Case {
                id: CaseId::new("c-1"),
                number: "SCS1001".to_string(),
                short_description: "VPN down, 20 users".to_string(),
                long_description: None,
                priority: 2,
                urgency: 2,
                company: "Acme".to_string(),
                assignment_group: None,
                account: None,
                current_category: None,
            },
            business_context: None,
            similar_cases: vec![],
            kb_articles: vec![],
            exemplars: vec![],
        }
    }

    const CATEGORIZATION_JSON: &str = r#"{
        "category": "Network", "subcategory": null, "incident_category": null,
        "incident_subcategory": null, "confidence": 0.9, "keywords": ["vpn"],
        "technical_entities": { "ip_addresses": [], "systems": [], "users": [], "software": [], "error_codes": [] },
        "urgency": "HIGH",
        "record_type_suggestion": { "kind": "INCIDENT", "is_major": false, "reasoning": "outage" },
        "service_offering": null, "application_service": null
    }"#;
    const NARRATIVE_JSON: &str = r#"{
        "quick_summary": "VPN concentrator restarted.",
        "immediate_next_steps": ["Restart concentrator"],
        "tone": "confident"
    }"#;
    const BI_JSON: &str = r#"{
        "project_scope_detected": { "flagged": false, "reason": null },
        "executive_visibility": { "flagged": false, "reason": null },
        "compliance_impact": { "flagged": false, "reason": null },
        "financial_impact": { "flagged": false, "reason": null },
        "systemic_issue": { "flagged": false, "reason": null },
        "outside_service_hours": { "flagged": false, "reason": null }
    }"#;

    #[test]
    fn run_merges_all_three_stage_outputs() {
        let llm = ScriptedLlm::new(vec![CATEGORIZATION_JSON, NARRATIVE_JSON, BI_JSON]);
        let config = PipelineConfig::default();
        let pipeline = ClassificationPipeline::new(&llm, &config);
        let result = pipeline.run(&context()).expect("pipeline succeeds");
        assert_eq!(result.category, "Network");
        assert_eq!(result.narrative.quick_summary, "VPN concentrator restarted.");
        assert!(!result.business_intelligence.project_scope_detected.flagged);
    }

    #[test]
    fn a_stage_that_fails_twice_surfaces_stage_parse_error() {
        let llm = ScriptedLlm::new(vec!["not json", "still not json"]);
        let config = PipelineConfig::default();
        let pipeline = ClassificationPipeline::new(&llm, &config);
        let err = pipeline.run(&context()).expect_err("should fail");
        match err {
            PipelineError::StageParseError { stage } => assert_eq!(stage, "categorization"),
            PipelineError::Core(_) => panic!("expected StageParseError"),
        }
    }

    #[test]
    fn a_stage_that_recovers_on_retry_succeeds() {
        let llm = ScriptedLlm::new(vec!["not json", CATEGORIZATION_JSON, NARRATIVE_JSON, BI_JSON]);
        let config = PipelineConfig::default();
        let pipeline = ClassificationPipeline::new(&llm, &config);
        let result = pipeline.run(&context()).expect("recovers on retry");
        assert_eq!(result.category, "Network");
    }

    #[test]
    fn render_context_includes_muscle_memory_only_when_present() {
        let mut ctx = context();
        assert!(!render_context(&ctx).contains("MUSCLE MEMORY"));

        ctx.exemplars.push(caseflow_core::MuscleMemoryExemplar {
            id: caseflow_core::ExemplarId::from_raw(1).expect("nonzero"),
            case_number: "CS0000001".to_string(),
            interaction_type: "classification".to_string(),
            input_context_snapshot: serde_json::Value::Null,
            action_taken: "restarted VPN concentrator".to_string(),
            outcome: "resolved".to_string(),
            embedding: vec![0.0; caseflow_core::EMBEDDING_DIMENSIONS],
            quality_score: 0.8,
            quality_signals: caseflow_core::QualitySignals {
                supervisor_approved: Some(true),
                outcome_success: Some(true),
                human_feedback_positive: None,
            },
            created_at: caseflow_core::Timestamp::now(),
            updated_at: caseflow_core::Timestamp::now(),
        });
        assert!(render_context(&ctx).contains("MUSCLE MEMORY"));
    }
}
