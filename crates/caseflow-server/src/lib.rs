// crates/caseflow-server/src/lib.rs
// ============================================================================
// Module: Caseflow Server
// Description: The Intake Dispatcher: an HTTP service wiring ServiceNow and
//              Slack webhooks, cron triggers, and a background worker loop
//              against the rest of the `caseflow-*` workspace.
// Purpose: One binary-ready library crate `caseflow-cli` drives for its
//          `serve` subcommand, and integration tests drive directly.
// Dependencies: axum, caseflow-broker, caseflow-clarification,
//               caseflow-config, caseflow-core, caseflow-escalation,
//               caseflow-monitor, caseflow-pipeline, caseflow-providers,
//               caseflow-store-sqlite, caseflow-validator, tokio
// ============================================================================

//! ## Overview
//! [`state::AppState::bootstrap`] builds every backend client from
//! [`settings::ServerSettings`] once at startup; [`routes::build_router`]
//! wires the HTTP surface against it. Background work ([`worker::Job`])
//! either runs inline in the request path or is published to a signed
//! external worker, per [`state::TaskQueueMode`] — in both cases
//! [`worker::process_job`] is the code that actually runs it.

pub mod correlation;
pub mod dedup;
pub mod error;
pub mod overview;
pub mod routes;
pub mod settings;
pub mod state;
pub mod worker;

pub use error::ApiError;
pub use routes::build_router;
pub use settings::Environment;
pub use settings::ServerSettings;
pub use settings::SettingsError;
pub use state::AppState;
pub use state::TaskQueueMode;
pub use worker::Job;
pub use worker::process_job;
