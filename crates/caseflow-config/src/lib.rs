// crates/caseflow-config/src/lib.rs
// ============================================================================
// Module: Caseflow Config
// Description: Process-wide configuration model, TOML/env loading, and
//              validation for the Case Intake & Orchestration Engine.
// Purpose: Give every crate one validated, typed configuration object
//          instead of ad hoc environment reads scattered through the
//          codebase.
// Dependencies: serde, toml, thiserror
// ============================================================================

//! ## Overview
//! Configuration is loaded once at startup from a TOML file, then
//! overridden by a small set of environment variables
//! (`FEATURE_SERVICENOW_REPOSITORIES_PCT`, `ESCALATION_CHANNEL_ID`,
//! `CASE_EMBEDDING_MODEL`, and friends) for operators who prefer env-based
//! rollout control. [`Config::validate`] is run after loading and before the
//! server or CLI does anything with the result — an invalid configuration
//! (most commonly a missing default escalation routing rule) is a startup
//! failure, never a runtime surprise.

mod env_overrides;
mod validate;

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub use validate::ConfigError;

/// Feature-flag rollout configuration for one repository seam (ServiceNow
/// case reads, business context, knowledge base, ...).
///
/// # Invariants
/// Precedence, applied by `caseflow-providers`: `force_disable` wins over
/// everything; else `force_enable` wins; else `allowed_users`/
/// `allowed_channels` win; else a deterministic FNV-1a(32) hash of the
/// caller id modulo 100 selects the new path iff `hash < rollout_pct`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlagConfig {
    /// Force every call through the legacy path.
    #[serde(default)]
    pub force_disable: bool,
    /// Force every call through the new path.
    #[serde(default)]
    pub force_enable: bool,
    /// User ids always routed to the new path.
    #[serde(default)]
    pub allowed_users: BTreeSet<String>,
    /// Slack channel ids always routed to the new path.
    #[serde(default)]
    pub allowed_channels: BTreeSet<String>,
    /// Percentage (0-100) of otherwise-unmatched callers routed to the new
    /// path, selected deterministically by caller id hash.
    #[serde(default)]
    pub rollout_pct: u8,
}

impl Default for FeatureFlagConfig {
    fn default() -> Self {
        Self {
            force_disable: false,
            force_enable: false,
            allowed_users: BTreeSet::new(),
            allowed_channels: BTreeSet::new(),
            rollout_pct: 0,
        }
    }
}

/// A single escalation channel-selection rule.
///
/// # Invariants
/// Config validation requires at least one rule with `client == Some("*")`
/// (or `None`, treated the same as a wildcard) and the lowest `priority` in
/// the set the environment overrides recognize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRoutingRule {
    /// Stable rule name, surfaced in the Slack escalation payload.
    pub name: String,
    /// Higher priority rules are tried first.
    pub priority: i32,
    /// Matches this client exactly, or any client if `"*"`/absent.
    #[serde(default)]
    pub client: Option<String>,
    /// Matches this category exactly, if present.
    #[serde(default)]
    pub category: Option<String>,
    /// Matches this assignment group exactly, if present.
    #[serde(default)]
    pub assignment_group: Option<String>,
    /// Destination Slack channel id.
    pub channel: String,
}

impl EscalationRoutingRule {
    /// Returns `true` if this rule is the mandatory wildcard default.
    #[must_use]
    pub fn is_default_rule(&self) -> bool {
        matches!(self.client.as_deref(), None | Some("*"))
            && self.category.is_none()
            && self.assignment_group.is_none()
    }

    /// Returns `true` if this rule's predicates all match the given case
    /// attributes (`None` predicates match anything).
    #[must_use]
    pub fn matches(&self, client: &str, category: &str, assignment_group: &str) -> bool {
        let client_matches = self
            .client
            .as_deref()
            .is_none_or(|want| want == "*" || want == client);
        let category_matches = self.category.as_deref().is_none_or(|want| want == category);
        let group_matches = self
            .assignment_group
            .as_deref()
            .is_none_or(|want| want == assignment_group);
        client_matches && category_matches && group_matches
    }
}

/// Escalation routing and threshold configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Default channel used before any routing rule is consulted, e.g. for
    /// monitor summary posts that are not case-specific.
    pub default_channel_id: String,
    /// Composite business-intelligence score threshold that triggers an
    /// escalation on its own, shared with the validator's confidence-vs-risk
    /// check (open question resolved in `DESIGN.md`).
    pub business_intelligence: BusinessIntelligenceThresholds,
    /// Ordered channel-selection rules. Must contain exactly one wildcard
    /// default rule with the lowest priority.
    pub routing_rules: Vec<EscalationRoutingRule>,
}

/// Thresholds shared between the validator and the escalation router.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BusinessIntelligenceThresholds {
    /// Composite BI score (0.0-1.0) at or above which the escalation router
    /// triggers regardless of which individual flags fired.
    pub escalation_score_threshold: f32,
}

/// Muscle-memory retrieval defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuscleMemoryConfig {
    /// Embedding model identifier, e.g. a vendor small-embedding model name.
    pub embedding_model: String,
    /// Number of exemplars to retrieve.
    pub top_k: usize,
    /// Maximum cosine distance for a retrieved exemplar to qualify.
    pub max_distance: f32,
    /// Minimum quality score for a retrieved exemplar to qualify.
    pub min_quality: f32,
    /// Cosine distance at or below which a new exemplar is treated as a
    /// duplicate of an existing one.
    pub duplicate_distance_threshold: f32,
}

impl Default for MuscleMemoryConfig {
    fn default() -> Self {
        Self {
            embedding_model: "text-embedding-3-small".to_string(),
            top_k: 3,
            max_distance: 0.5,
            min_quality: 0.7,
            duplicate_distance_threshold: 0.05,
        }
    }
}

/// Validator thresholds and category sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Classification confidence below which a warning is raised.
    pub confidence_threshold: f32,
    /// Categories that require HR-sensitive handling in clarification.
    pub hr_required_categories: BTreeSet<String>,
    /// Categories treated as high risk for the category-consistency check.
    pub high_risk_categories: BTreeSet<String>,
    /// Categories treated as business-as-usual; anything else triggers the
    /// non-BAU escalation check.
    pub business_as_usual_categories: BTreeSet<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            hr_required_categories: BTreeSet::new(),
            high_risk_categories: BTreeSet::new(),
            business_as_usual_categories: BTreeSet::new(),
        }
    }
}

/// Per-project/client clarification reminder policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClarificationReminderPolicy {
    /// Minutes before `expires_at` that the first reminder fires.
    pub reminder_lead_minutes: u32,
    /// Maximum number of reminders sent before expiry.
    pub max_reminders: u32,
}

impl Default for ClarificationReminderPolicy {
    fn default() -> Self {
        Self {
            reminder_lead_minutes: 60,
            max_reminders: 2,
        }
    }
}

/// Clarification session configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClarificationConfig {
    /// Default reminder policy, used when a project/client has none.
    #[serde(default)]
    pub default_policy: ClarificationReminderPolicy,
    /// Per-project/client overrides, keyed by client name.
    #[serde(default)]
    pub policy_overrides: BTreeMap<String, ClarificationReminderPolicy>,
}

impl ClarificationConfig {
    /// Returns the effective reminder policy for `client`.
    #[must_use]
    pub fn policy_for(&self, client: &str) -> ClarificationReminderPolicy {
        self.policy_overrides
            .get(client)
            .copied()
            .unwrap_or(self.default_policy)
    }
}

/// Stuck-case monitor severity bucket thresholds, in hours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Minimum blocked age, in hours, for the Warning bucket.
    pub warning_hours: f64,
    /// Minimum blocked age, in hours, for the Critical bucket.
    pub critical_hours: f64,
    /// Minimum blocked age, in hours, for the Alert bucket.
    pub alert_hours: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            warning_hours: 4.0,
            critical_hours: 8.0,
            alert_hours: 24.0,
        }
    }
}

/// Classification pipeline timing and per-stage temperature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Overall pipeline deadline, in seconds.
    pub deadline_secs: u64,
    /// Categorization-stage sampling temperature.
    pub categorization_temperature: f32,
    /// Narrative-stage sampling temperature.
    pub narrative_temperature: f32,
    /// Business-intelligence-stage sampling temperature.
    pub business_intelligence_temperature: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 60,
            categorization_temperature: 0.0,
            narrative_temperature: 0.2,
            business_intelligence_temperature: 0.0,
        }
    }
}

/// Feature-flagged repository adapter configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// If `true`, a NEW-path exception propagates to the caller instead of
    /// falling back to the legacy path. Default `false` (fallback), per the
    /// open question resolved in `DESIGN.md`.
    #[serde(default)]
    pub fail_closed: bool,
    /// Per-repository rollout configuration, keyed by repository name
    /// (`"servicenow_case"`, `"business_context"`, `"knowledge_base"`, ...).
    #[serde(default)]
    pub repositories: BTreeMap<String, FeatureFlagConfig>,
}

impl ProvidersConfig {
    /// Returns the feature-flag configuration for `repository`, or the
    /// all-legacy default if unconfigured.
    #[must_use]
    pub fn flag_for(&self, repository: &str) -> FeatureFlagConfig {
        self.repositories
            .get(repository)
            .cloned()
            .unwrap_or_default()
    }
}

/// The complete, validated process configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Repository adapter / feature-flag configuration.
    pub providers: ProvidersConfig,
    /// Escalation routing configuration.
    pub escalation: EscalationConfig,
    /// Muscle-memory retrieval configuration.
    #[serde(default)]
    pub muscle_memory: MuscleMemoryConfig,
    /// Validator thresholds and category sets.
    #[serde(default)]
    pub validator: ValidatorConfig,
    /// Clarification session reminder policy.
    #[serde(default)]
    pub clarification: ClarificationConfig,
    /// Stuck-case monitor thresholds.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Classification pipeline timing.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Errors produced while loading configuration from disk or environment.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file's TOML could not be parsed.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying parse error.
        #[source]
        source: Box<toml::de::Error>,
    },
    /// The loaded configuration failed validation.
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

impl Config {
    /// Loads configuration from a TOML file at `path`, applies environment
    /// overrides, and validates the result.
    ///
    /// # Errors
    /// Returns [`ConfigLoadError::Read`] or [`ConfigLoadError::Parse`] if
    /// the file cannot be read or parsed, [`ConfigLoadError::Invalid`] if
    /// validation fails.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, ConfigLoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text, path.display().to_string())
    }

    /// Loads configuration from an in-memory TOML string, applies
    /// environment overrides, and validates the result.
    ///
    /// # Errors
    /// Returns [`ConfigLoadError::Parse`] if `text` is not valid TOML for
    /// this schema, [`ConfigLoadError::Invalid`] if validation fails.
    pub fn load_from_str(text: &str, source_label: impl Into<String>) -> Result<Self, ConfigLoadError> {
        let mut config: Self = toml::from_str(text).map_err(|source| ConfigLoadError::Parse {
            path: source_label.into(),
            source: Box::new(source),
        })?;
        env_overrides::apply(&mut config, &std::env::vars().collect());
        config.validate()?;
        Ok(config)
    }

    /// Validates every cross-field invariant the configuration requires.
    ///
    /// # Errors
    /// Returns [`ConfigError`] describing the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate::validate(self)
    }
}
