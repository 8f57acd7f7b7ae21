// crates/caseflow-server/src/state.rs
// ============================================================================
// Module: Application State
// Description: Wires every backend (ServiceNow, Slack, LLM, embedding,
//              SQLite store, task queue) into the shared state every HTTP
//              handler and the worker loop borrow from.
// Purpose: One construction point (`AppState::bootstrap`) instead of each
//          handler building its own clients.
// Dependencies: caseflow-broker, caseflow-config, caseflow-core,
//               caseflow-providers, caseflow-store-sqlite
// ============================================================================

//! ## Overview
//! [`AppState`] owns one instance of every backend client and the SQLite
//! store; handlers borrow `&dyn Trait` references out of it for the
//! duration of a request rather than each constructing their own. The one
//! repository seam with a legacy/new split
//! ([`caseflow_providers::FeatureFlaggedCaseRepository`]) is built fresh per
//! request in [`AppState::case_repository_for`], since its dispatch target
//! is resolved once per caller at construction — this deployment has only
//! one concrete `CaseRepository` backend (ServiceNow) today, so both arms
//! wrap the same [`ServiceNowHttpClient`] behind an `Arc`; the adapter still
//! earns its keep by making a second backend a configuration change rather
//! than a rewrite, and by recording every forced fallback to the ledger the
//! audit sink already keeps.

use std::sync::Arc;

use caseflow_broker::HttpSink;
use caseflow_broker::HttpSinkConfig;
use caseflow_broker::InlineSink;
use caseflow_broker::Sink;
use caseflow_broker::TaskQueueAdapter;
use caseflow_config::Config;
use caseflow_core::AuditEntry;
use caseflow_core::AuditSink;
use caseflow_core::CaseId;
use caseflow_core::CaseRepository;
use caseflow_core::CoreError;
use caseflow_providers::EmbeddingHttpClient;
use caseflow_providers::EmbeddingHttpConfig;
use caseflow_providers::FeatureFlaggedCaseRepository;
use caseflow_providers::HttpPolicyConfig;
use caseflow_providers::LlmHttpClient;
use caseflow_providers::LlmHttpConfig;
use caseflow_providers::ServiceNowAuth;
use caseflow_providers::ServiceNowHttpClient;
use caseflow_providers::ServiceNowHttpConfig;
use caseflow_providers::SlackHttpClient;
use caseflow_providers::SlackHttpConfig;
use caseflow_store_sqlite::SqliteStore;
use caseflow_store_sqlite::SqliteStoreConfig;

use crate::correlation::CorrelationIdGenerator;
use crate::dedup::DedupWindow;
use crate::settings::Environment;
use crate::settings::ServerSettings;

/// Everything an HTTP handler or the worker loop needs, built once at
/// startup.
pub struct AppState {
    /// Validated domain configuration (routing, thresholds, rollout).
    pub config: Config,
    /// Deployment environment, gating admin authentication.
    pub environment: Environment,
    /// Bearer token admin endpoints require outside development.
    pub admin_bearer_token: Option<String>,
    /// SQLite-backed gate/session/escalation/exemplar/audit store.
    pub store: Arc<SqliteStore>,
    /// ServiceNow case/business-context/similar-case/KB/CI client.
    pub servicenow: Arc<ServiceNowHttpClient>,
    /// Slack message posting and inbound signature verification.
    pub slack: SlackHttpClient,
    /// LLM chat-completion client for the classification pipeline.
    pub llm: LlmHttpClient,
    /// Embedding client for the muscle-memory retriever.
    pub embedding: EmbeddingHttpClient,
    /// Publishes background work, either inline or to a signed worker.
    pub task_queue: TaskQueueAdapter,
    /// Whether background jobs route through `task_queue` or run inline.
    pub task_queue_mode: TaskQueueMode,
    /// Recent `{source, external_id}` webhook deliveries.
    pub dedup: DedupWindow,
    /// Issues server-side correlation ids for inbound requests.
    pub correlation: CorrelationIdGenerator,
}

/// How a caller handing a [`crate::worker::Job`] to [`AppState`] should have
/// it executed.
///
/// `TaskQueueAdapter` only ever holds a real sink when a signing key and
/// worker URL are both configured; otherwise its sink is [`inert_sink`] and
/// would reject every publish. Callers match on this before deciding whether
/// to call `state.task_queue.publish` or run the job directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskQueueMode {
    /// No signing key/worker URL configured; run jobs in the request path.
    Inline,
    /// Publish signed job envelopes to an external worker over HTTP.
    Signed,
}

impl AppState {
    /// Builds the full application state from settings and domain config.
    ///
    /// # Errors
    /// Returns [`CoreError`] if any backend client fails to construct (an
    /// invalid HTTP policy, an unreadable SQLite path).
    pub fn bootstrap(settings: &ServerSettings, config: Config) -> Result<Self, CoreError> {
        let http_policy = HttpPolicyConfig::default();

        let servicenow = Arc::new(ServiceNowHttpClient::new(ServiceNowHttpConfig {
            base_url: settings.servicenow_base_url.clone(),
            case_table: settings.servicenow_case_table.clone(),
            api_token: settings.servicenow_api_token.clone(),
            inbound_auth: ServiceNowAuth::Bearer(settings.servicenow_inbound_secret.clone()),
            http: http_policy.clone(),
        })?);

        let slack = SlackHttpClient::new(SlackHttpConfig {
            api_base_url: settings.slack_api_base_url.clone(),
            bot_token: settings.slack_bot_token.clone(),
            signing_secret: settings.slack_signing_secret.clone(),
            http: http_policy.clone(),
        })?;

        let llm = LlmHttpClient::new(LlmHttpConfig {
            base_url: settings.llm_base_url.clone(),
            api_key: settings.llm_api_key.clone(),
            model: settings.llm_model.clone(),
            http: http_policy.clone(),
        })?;

        let embedding = EmbeddingHttpClient::new(EmbeddingHttpConfig {
            base_url: settings.embedding_base_url.clone(),
            api_key: settings.embedding_api_key.clone(),
            model: config.muscle_memory.embedding_model.clone(),
            http: http_policy,
        })?;

        let store = Arc::new(
            SqliteStore::open(&SqliteStoreConfig::file(settings.sqlite_path.clone())).map_err(|source| {
                CoreError::Transient {
                    operation: "sqlite_store_open",
                    detail: source.to_string(),
                }
            })?,
        );

        let task_queue = build_task_queue(settings);
        let task_queue_mode = match (&settings.task_queue_signing_key, &settings.task_queue_worker_url) {
            (Some(_), Some(_)) => TaskQueueMode::Signed,
            _ => TaskQueueMode::Inline,
        };

        Ok(Self {
            config,
            environment: settings.environment,
            admin_bearer_token: settings.admin_bearer_token.clone(),
            store,
            servicenow,
            slack,
            llm,
            embedding,
            task_queue,
            task_queue_mode,
            dedup: DedupWindow::default(),
            correlation: CorrelationIdGenerator::new("cf"),
        })
    }

    /// Builds a feature-flagged case repository for one caller's unit of
    /// work — a single webhook request or worker job.
    #[must_use]
    pub fn case_repository_for(&self, caller_id: &str, channel_id: Option<String>) -> FeatureFlaggedCaseRepository {
        FeatureFlaggedCaseRepository::new(
            Box::new(SharedServiceNow(Arc::clone(&self.servicenow))),
            Box::new(SharedServiceNow(Arc::clone(&self.servicenow))),
            self.config.providers.flag_for("servicenow_case"),
            caller_id,
            channel_id,
            self.config.providers.fail_closed,
            Box::new(SharedAuditSink(Arc::clone(&self.store))),
        )
    }
}

/// Builds the task queue sink from settings: a signed [`HttpSink`] when a
/// signing key and worker URL are configured, or an [`InlineSink`] that
/// never exists here — inline jobs are dispatched directly by
/// [`crate::worker::process_job`] rather than boxed behind a `Sink`, since
/// inline execution needs the very `AppState` the sink would otherwise
/// close over. See `spec.md` §4.2: the choice is made once, at startup,
/// from whether a signing key is present.
fn build_task_queue(settings: &ServerSettings) -> TaskQueueAdapter {
    match (&settings.task_queue_signing_key, &settings.task_queue_worker_url) {
        (Some(key), Some(url)) => {
            let sink = HttpSink::new(HttpSinkConfig {
                worker_url: url.clone(),
                signing_key: key.clone(),
                request_timeout: std::time::Duration::from_secs(10),
            })
            .unwrap_or_else(|_| {
                tracing::warn!("failed to build signed task queue sink, falling back to a no-op one");
                inert_sink()
            });
            TaskQueueAdapter::new(Box::new(sink))
        }
        _ => TaskQueueAdapter::new(Box::new(inert_sink())),
    }
}

/// An [`InlineSink`] whose handler always reports the job unconsumed. Used
/// only when [`HttpSink`] construction itself fails (a malformed worker
/// URL); the worker endpoint is the intended consumer for signed delivery,
/// this is purely a fail-safe rather than the default path.
fn inert_sink() -> InlineSink {
    InlineSink::new(Box::new(|_| {
        Err(CoreError::Transient {
            operation: "task_queue_publish",
            detail: "task queue sink failed to initialize".to_string(),
        })
    }))
}

struct SharedServiceNow(Arc<ServiceNowHttpClient>);

impl CaseRepository for SharedServiceNow {
    fn get_case(&self, id: &CaseId) -> Result<caseflow_core::Case, CoreError> {
        self.0.get_case(id)
    }

    fn append_work_note(&self, id: &CaseId, note: &str) -> Result<(), CoreError> {
        self.0.append_work_note(id, note)
    }

    fn apply_classification(&self, id: &CaseId, category: &str, subcategory: Option<&str>) -> Result<(), CoreError> {
        self.0.apply_classification(id, category, subcategory)
    }
}

struct SharedAuditSink(Arc<SqliteStore>);

impl AuditSink for SharedAuditSink {
    fn append(&self, entry: AuditEntry) -> Result<AuditEntry, CoreError> {
        self.0.append(entry)
    }
}
