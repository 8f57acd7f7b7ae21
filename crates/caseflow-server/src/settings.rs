// crates/caseflow-server/src/settings.rs
// ============================================================================
// Module: Server Settings
// Description: Process-level settings the server needs before it can load
//              `caseflow_config::Config` or open any backend connection —
//              where to bind, which environment it is running in, and the
//              secrets every inbound/outbound integration needs.
// Purpose: Keep deployment wiring (ports, file paths, credentials) separate
//          from the domain configuration `caseflow-config` validates.
// Dependencies: caseflow-config, thiserror
// ============================================================================

//! ## Overview
//! `caseflow-config::Config` describes *what the system should decide*
//! (routing rules, thresholds, rollout percentages); [`ServerSettings`]
//! describes *how this process is deployed* (listen address, backend
//! credentials, whether admin endpoints require a bearer token). The two are
//! loaded independently: settings from environment variables, domain config
//! from the TOML file `--config` points at.

use std::env;
use std::net::SocketAddr;

use thiserror::Error;

/// Deployment environment, gating whether admin endpoints require
/// authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Local development; admin endpoints are open.
    Development,
    /// Any deployed environment; admin endpoints require a bearer token.
    Production,
}

impl Environment {
    fn from_env_var(value: &str) -> Self {
        if value.eq_ignore_ascii_case("development") || value.eq_ignore_ascii_case("dev") {
            Self::Development
        } else {
            Self::Production
        }
    }
}

/// Errors produced while assembling [`ServerSettings`] from the process
/// environment.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A required environment variable was not set.
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    /// An environment variable was set but could not be parsed.
    #[error("invalid value for environment variable {name}: {detail}")]
    InvalidVar {
        /// The variable name.
        name: &'static str,
        /// What was wrong with it.
        detail: String,
    },
}

/// Process-level deployment settings.
pub struct ServerSettings {
    /// Address the HTTP listener binds to.
    pub listen_addr: SocketAddr,
    /// Deployment environment.
    pub environment: Environment,
    /// Path to the `caseflow-config` TOML file.
    pub config_path: std::path::PathBuf,
    /// Path to the SQLite store file (`:memory:` for ephemeral runs).
    pub sqlite_path: String,
    /// ServiceNow instance base URL.
    pub servicenow_base_url: String,
    /// ServiceNow case table name.
    pub servicenow_case_table: String,
    /// ServiceNow outbound API bearer token.
    pub servicenow_api_token: String,
    /// Shared secret (or bearer token) ServiceNow signs/sends inbound
    /// webhook requests with.
    pub servicenow_inbound_secret: String,
    /// Slack Web API base URL.
    pub slack_api_base_url: String,
    /// Slack bot token.
    pub slack_bot_token: String,
    /// Slack signing secret, used to verify inbound requests.
    pub slack_signing_secret: String,
    /// LLM endpoint base URL.
    pub llm_base_url: String,
    /// LLM API key.
    pub llm_api_key: String,
    /// LLM model identifier.
    pub llm_model: String,
    /// Embedding endpoint base URL.
    pub embedding_base_url: String,
    /// Embedding API key.
    pub embedding_api_key: String,
    /// Bearer token admin endpoints require outside [`Environment::Development`].
    pub admin_bearer_token: Option<String>,
    /// HMAC signing key for outbound task-queue jobs. Absent means the task
    /// queue runs every job in-process instead of dispatching to a worker.
    pub task_queue_signing_key: Option<String>,
    /// Worker URL the task queue posts signed jobs to, when a signing key is
    /// configured.
    pub task_queue_worker_url: Option<String>,
}

impl ServerSettings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    /// Returns [`SettingsError`] if a required variable is missing or a
    /// present one cannot be parsed.
    pub fn from_env() -> Result<Self, SettingsError> {
        let listen_addr = env::var("CASEFLOW_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .map_err(|err| SettingsError::InvalidVar {
                name: "CASEFLOW_LISTEN_ADDR",
                detail: err.to_string(),
            })?;
        let environment = env::var("CASEFLOW_ENV")
            .map(|value| Environment::from_env_var(&value))
            .unwrap_or(Environment::Development);
        Ok(Self {
            listen_addr,
            environment,
            config_path: env::var("CASEFLOW_CONFIG_PATH")
                .unwrap_or_else(|_| "caseflow.toml".to_string())
                .into(),
            sqlite_path: env::var("CASEFLOW_SQLITE_PATH").unwrap_or_else(|_| "caseflow.db".to_string()),
            servicenow_base_url: required(environment, "SERVICENOW_BASE_URL")?,
            servicenow_case_table: env::var("SERVICENOW_CASE_TABLE").unwrap_or_else(|_| "incident".to_string()),
            servicenow_api_token: required(environment, "SERVICENOW_API_TOKEN")?,
            servicenow_inbound_secret: required(environment, "SERVICENOW_INBOUND_SECRET")?,
            slack_api_base_url: env::var("SLACK_API_BASE_URL").unwrap_or_else(|_| "https://slack.com/api".to_string()),
            slack_bot_token: required(environment, "SLACK_BOT_TOKEN")?,
            slack_signing_secret: required(environment, "SLACK_SIGNING_SECRET")?,
            llm_base_url: required(environment, "LLM_BASE_URL")?,
            llm_api_key: required(environment, "LLM_API_KEY")?,
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            embedding_base_url: required(environment, "EMBEDDING_BASE_URL")?,
            embedding_api_key: required(environment, "EMBEDDING_API_KEY")?,
            admin_bearer_token: env::var("CASEFLOW_ADMIN_TOKEN").ok(),
            task_queue_signing_key: env::var("TASK_QUEUE_SIGNING_KEY").ok(),
            task_queue_worker_url: env::var("TASK_QUEUE_WORKER_URL").ok(),
        })
    }
}

/// Reads a required variable, except in [`Environment::Development`] where a
/// placeholder is substituted so a local run never needs real credentials.
fn required(environment: Environment, name: &'static str) -> Result<String, SettingsError> {
    match env::var(name) {
        Ok(value) => Ok(value),
        Err(_) if environment == Environment::Development => Ok(format!("dev-placeholder-{}", name.to_lowercase())),
        Err(_) => Err(SettingsError::MissingVar(name)),
    }
}
