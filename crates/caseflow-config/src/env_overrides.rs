// crates/caseflow-config/src/env_overrides.rs
// ============================================================================
// Module: Config Environment Overrides
// Description: The small set of environment variables operators can use to
//              adjust feature-flag rollout without redeploying the TOML
//              config file.
// ============================================================================

use std::collections::BTreeSet;
use std::collections::HashMap;

use crate::Config;
use crate::FeatureFlagConfig;

const SERVICENOW_REPOSITORY_KEY: &str = "servicenow_case";

/// Applies environment-variable overrides on top of a file-loaded `Config`.
/// Only a fixed set of keys is recognized; anything else in the
/// environment is ignored by this function (the caller may still read other
/// variables for unrelated purposes, e.g. secrets).
pub(crate) fn apply(config: &mut Config, env: &HashMap<String, String>) {
    apply_feature_flag_env(
        config
            .providers
            .repositories
            .entry(SERVICENOW_REPOSITORY_KEY.to_string())
            .or_default(),
        env,
    );

    if let Some(channel) = env.get("ESCALATION_CHANNEL_ID") {
        config.escalation.default_channel_id.clone_from(channel);
    }

    if let Some(model) = env.get("CASE_EMBEDDING_MODEL") {
        config.muscle_memory.embedding_model.clone_from(model);
    }
}

fn apply_feature_flag_env(flag: &mut FeatureFlagConfig, env: &HashMap<String, String>) {
    if let Some(value) = env.get("FEATURE_SERVICENOW_REPOSITORIES_PCT") {
        if let Ok(pct) = value.parse::<u8>() {
            flag.rollout_pct = pct;
        }
    }
    if let Some(value) = env.get("FEATURE_SERVICENOW_REPOSITORIES_USERS") {
        flag.allowed_users = split_csv(value);
    }
    if let Some(value) = env.get("FEATURE_SERVICENOW_REPOSITORIES_CHANNELS") {
        flag.allowed_channels = split_csv(value);
    }
    if let Some(value) = env.get("FEATURE_SERVICENOW_REPOSITORIES_FORCE_ENABLE") {
        flag.force_enable = parse_bool(value);
    }
    if let Some(value) = env.get("FEATURE_SERVICENOW_REPOSITORIES_FORCE_DISABLE") {
        flag.force_disable = parse_bool(value);
    }
}

fn split_csv(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BusinessIntelligenceThresholds;
    use crate::EscalationConfig;
    use crate::EscalationRoutingRule;
    use crate::ProvidersConfig;

    fn base_config() -> Config {
        Config {
            providers: ProvidersConfig::default(),
            escalation: EscalationConfig {
                default_channel_id: "C_DEFAULT".to_string(),
                business_intelligence: BusinessIntelligenceThresholds {
                    escalation_score_threshold: 0.6,
                },
                routing_rules: vec![EscalationRoutingRule {
                    name: "default".to_string(),
                    priority: 0,
                    client: None,
                    category: None,
                    assignment_group: None,
                    channel: "C_DEFAULT".to_string(),
                }],
            },
            muscle_memory: crate::MuscleMemoryConfig::default(),
            validator: crate::ValidatorConfig::default(),
            clarification: crate::ClarificationConfig::default(),
            monitor: crate::MonitorConfig::default(),
            pipeline: crate::PipelineConfig::default(),
        }
    }

    #[test]
    fn escalation_channel_override_replaces_default() {
        let mut config = base_config();
        let env = HashMap::from([("ESCALATION_CHANNEL_ID".to_string(), "C_OVERRIDE".to_string())]);
        apply(&mut config, &env);
        assert_eq!(config.escalation.default_channel_id, "C_OVERRIDE");
    }

    #[test]
    fn force_disable_env_wins_over_unset_default() {
        let mut config = base_config();
        let env = HashMap::from([(
            "FEATURE_SERVICENOW_REPOSITORIES_FORCE_DISABLE".to_string(),
            "true".to_string(),
        )]);
        apply(&mut config, &env);
        assert!(config.providers.flag_for(SERVICENOW_REPOSITORY_KEY).force_disable);
    }

    #[test]
    fn rollout_pct_parses_from_env() {
        let mut config = base_config();
        let env = HashMap::from([(
            "FEATURE_SERVICENOW_REPOSITORIES_PCT".to_string(),
            "25".to_string(),
        )]);
        apply(&mut config, &env);
        assert_eq!(config.providers.flag_for(SERVICENOW_REPOSITORY_KEY).rollout_pct, 25);
    }
}
