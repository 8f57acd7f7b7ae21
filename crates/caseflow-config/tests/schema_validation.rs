// crates/caseflow-config/tests/schema_validation.rs
// ============================================================================
// Validates that a well-formed TOML document parses into `Config` and that
// the documented defaults apply when optional sections are omitted.
// ============================================================================

use caseflow_config::Config;

const MINIMAL_VALID_TOML: &str = r#"
[providers]
fail_closed = false

[escalation]
default_channel_id = "C_ESCALATIONS"

[escalation.business_intelligence]
escalation_score_threshold = 0.6

[[escalation.routing_rules]]
name = "default"
priority = 0
channel = "C_ESCALATIONS"
"#;

#[test]
fn minimal_document_loads_with_defaults() {
    let config = Config::load_from_str(MINIMAL_VALID_TOML, "minimal.toml").expect("valid config");
    assert_eq!(config.muscle_memory.top_k, 3);
    assert!((config.muscle_memory.max_distance - 0.5).abs() < f32::EPSILON);
    assert!((config.validator.confidence_threshold - 0.7).abs() < f32::EPSILON);
    assert_eq!(config.pipeline.deadline_secs, 60);
}

#[test]
fn escalation_routing_rule_sections_parse_in_priority_order() {
    let toml = format!(
        r#"
{MINIMAL_VALID_TOML}

[[escalation.routing_rules]]
name = "enterprise"
priority = 10
client = "acme"
channel = "C_ACME"
"#
    );
    let config = Config::load_from_str(&toml, "with-rule.toml").expect("valid config");
    assert_eq!(config.escalation.routing_rules.len(), 2);
    assert_eq!(config.escalation.routing_rules[1].name, "enterprise");
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let err = Config::load_from_str("not = [valid", "broken.toml").unwrap_err();
    assert!(matches!(err, caseflow_config::ConfigLoadError::Parse { .. }));
}
