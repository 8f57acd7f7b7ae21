// crates/caseflow-config/src/validate.rs
// ============================================================================
// Module: Config Validation
// Description: Cross-field invariants `Config::validate` enforces.
// ============================================================================

use thiserror::Error;

use crate::Config;

/// A configuration validation failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `escalation.routing_rules` has no wildcard default rule.
    #[error(
        "escalation.routing_rules must contain exactly one default rule \
         (client = \"*\" or absent, no category/assignment_group predicate); found none"
    )]
    MissingDefaultEscalationRule,
    /// `escalation.routing_rules` has more than one wildcard default rule.
    #[error(
        "escalation.routing_rules must contain exactly one default rule; found {count}"
    )]
    DuplicateDefaultEscalationRule {
        /// How many default rules were found.
        count: usize,
    },
    /// The mandatory default rule does not have the lowest priority.
    #[error(
        "the default escalation rule \"{name}\" must have the lowest priority in \
         routing_rules, but {other_priority} is lower"
    )]
    DefaultEscalationRuleNotLowestPriority {
        /// The default rule's name.
        name: String,
        /// A non-default rule's priority that is lower than the default's.
        other_priority: i32,
    },
    /// A threshold or percentage field is outside its valid range.
    #[error("{field} must be within {range}, got {value}")]
    OutOfRange {
        /// The offending field's dotted path.
        field: &'static str,
        /// The valid range, rendered for the error message.
        range: &'static str,
        /// The value that was rejected.
        value: String,
    },
    /// `muscle_memory.top_k` is zero.
    #[error("muscle_memory.top_k must be at least 1")]
    ZeroTopK,
}

pub(crate) fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_escalation_rules(config)?;
    validate_ranges(config)?;
    Ok(())
}

fn validate_escalation_rules(config: &Config) -> Result<(), ConfigError> {
    let defaults: Vec<_> = config
        .escalation
        .routing_rules
        .iter()
        .filter(|rule| rule.is_default_rule())
        .collect();

    match defaults.len() {
        0 => return Err(ConfigError::MissingDefaultEscalationRule),
        1 => {}
        count => return Err(ConfigError::DuplicateDefaultEscalationRule { count }),
    }

    let default_rule = defaults[0];
    if let Some(lower) = config
        .escalation
        .routing_rules
        .iter()
        .filter(|rule| !rule.is_default_rule())
        .map(|rule| rule.priority)
        .filter(|priority| *priority < default_rule.priority)
        .min()
    {
        return Err(ConfigError::DefaultEscalationRuleNotLowestPriority {
            name: default_rule.name.clone(),
            other_priority: lower,
        });
    }

    Ok(())
}

fn validate_ranges(config: &Config) -> Result<(), ConfigError> {
    let unit_interval = |field: &'static str, value: f32| -> Result<(), ConfigError> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::OutOfRange {
                field,
                range: "0.0..=1.0",
                value: value.to_string(),
            });
        }
        Ok(())
    };

    unit_interval(
        "escalation.business_intelligence.escalation_score_threshold",
        config.escalation.business_intelligence.escalation_score_threshold,
    )?;
    unit_interval("validator.confidence_threshold", config.validator.confidence_threshold)?;
    unit_interval("muscle_memory.max_distance", config.muscle_memory.max_distance)?;
    unit_interval("muscle_memory.min_quality", config.muscle_memory.min_quality)?;
    unit_interval(
        "muscle_memory.duplicate_distance_threshold",
        config.muscle_memory.duplicate_distance_threshold,
    )?;

    if config.muscle_memory.top_k == 0 {
        return Err(ConfigError::ZeroTopK);
    }

    for flag in config.providers.repositories.values() {
        if flag.rollout_pct > 100 {
            return Err(ConfigError::OutOfRange {
                field: "providers.repositories[*].rollout_pct",
                range: "0..=100",
                value: flag.rollout_pct.to_string(),
            });
        }
    }

    let monitor = &config.monitor;
    if !(monitor.warning_hours < monitor.critical_hours && monitor.critical_hours < monitor.alert_hours) {
        return Err(ConfigError::OutOfRange {
            field: "monitor.{warning,critical,alert}_hours",
            range: "warning_hours < critical_hours < alert_hours",
            value: format!(
                "{}, {}, {}",
                monitor.warning_hours, monitor.critical_hours, monitor.alert_hours
            ),
        });
    }

    Ok(())
}
