// crates/caseflow-providers/src/lib.rs
// ============================================================================
// Module: Caseflow Providers
// Description: Concrete HTTP-backed implementations of the repository and
//              client trait seams `caseflow-core` defines, plus the
//              feature-flagged adapter that routes between a legacy and new
//              repository implementation per caller.
// Purpose: Give the pipeline, validator, clarification, and escalation
//          crates a real ServiceNow/Slack/LLM/embedding backend, without any
//          of them depending on `reqwest` directly.
// Dependencies: caseflow-core, hmac, reqwest, serde_json, sha2, thiserror,
//               time, url
// ============================================================================

//! ## Overview
//! Every outbound HTTP call in this crate goes through [`http_policy`]'s
//! pinned-DNS, redirect-rejecting, size-bounded client — the same posture
//! used for every external call in this workspace, whether it targets
//! ServiceNow, Slack, or a model endpoint. [`repository`] implements the
//! feature-flag precedence `spec.md` §4.9 requires: `force_disable` beats
//! `force_enable` beats the per-user/channel allowlist beats a deterministic
//! hash-based rollout percentage.

pub mod embedding;
pub mod http_policy;
pub mod llm;
pub mod repository;
pub mod servicenow;
pub mod slack;

pub use embedding::EmbeddingHttpClient;
pub use embedding::EmbeddingHttpConfig;
pub use http_policy::HttpPolicyConfig;
pub use http_policy::HttpPolicyError;
pub use llm::LlmHttpClient;
pub use llm::LlmHttpConfig;
pub use repository::FeatureFlaggedCaseRepository;
pub use repository::fnv1a32;
pub use repository::resolve_rollout;
pub use servicenow::ServiceNowAuth;
pub use servicenow::ServiceNowHttpClient;
pub use servicenow::ServiceNowHttpConfig;
pub use slack::SlackHttpClient;
pub use slack::SlackHttpConfig;
