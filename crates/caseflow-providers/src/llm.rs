// crates/caseflow-providers/src/llm.rs
// ============================================================================
// Module: LLM HTTP Client
// Description: Chat-completion calls against an OpenAI-compatible endpoint.
// Purpose: Back every classification-pipeline stage (Categorization,
//          Narrative, Business Intelligence) with a real model call.
// Dependencies: caseflow-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! One client, one endpoint shape: a `POST {base_url}/chat/completions` call
//! with `messages: [{role: "system", ...}, {role: "user", ...}]` and
//! `temperature`, returning `choices[0].message.content`. Any
//! OpenAI-compatible gateway (including most self-hosted model servers)
//! fits this shape.

use reqwest::Method;
use serde_json::Value;

use caseflow_core::CoreError;
use caseflow_core::LlmClient;

use crate::http_policy::HttpPolicyConfig;
use crate::http_policy::HttpPolicyError;
use crate::http_policy::PolicedHttpClient;

const SOURCE: &str = "llm";

/// Connection configuration for [`LlmHttpClient`].
#[derive(Debug, Clone)]
pub struct LlmHttpConfig {
    /// Endpoint base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Model identifier to request.
    pub model: String,
    /// Outbound request policy.
    pub http: HttpPolicyConfig,
}

/// An OpenAI-compatible chat-completion implementation of [`LlmClient`].
pub struct LlmHttpClient {
    config: LlmHttpConfig,
    http: PolicedHttpClient,
}

impl LlmHttpClient {
    /// Builds a client from `config`.
    ///
    /// # Errors
    /// Returns [`CoreError::Transient`] if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(config: LlmHttpConfig) -> Result<Self, CoreError> {
        let http = PolicedHttpClient::new(config.http.clone()).map_err(policy_error)?;
        Ok(Self { config, http })
    }
}

impl LlmClient for LlmHttpClient {
    fn complete(&self, system_prompt: &str, user_prompt: &str, temperature: f32) -> Result<String, CoreError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "temperature": temperature,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt },
            ],
        });
        let payload = serde_json::to_vec(&body).map_err(|err| CoreError::InvalidResponse {
            source: SOURCE,
            detail: format!("failed to encode request body: {err}"),
        })?;
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .execute(
                Method::POST,
                &url,
                &[
                    ("authorization", format!("Bearer {}", self.config.api_key)),
                    ("content-type", "application/json".to_string()),
                ],
                Some(payload),
            )
            .map_err(|err| policy_error_for_operation("complete", err))?;
        if response.status == 429 || response.status >= 500 {
            return Err(CoreError::Transient {
                operation: "complete",
                detail: format!("model endpoint returned status {}", response.status),
            });
        }
        if !(200..300).contains(&response.status) {
            return Err(CoreError::InvalidResponse {
                source: SOURCE,
                detail: format!("unexpected status {}", response.status),
            });
        }
        let parsed: Value = serde_json::from_slice(&response.body).map_err(|err| CoreError::InvalidResponse {
            source: SOURCE,
            detail: format!("invalid JSON response: {err}"),
        })?;
        parsed
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CoreError::InvalidResponse {
                source: SOURCE,
                detail: "response missing choices[0].message.content".to_string(),
            })
    }
}

fn policy_error(err: HttpPolicyError) -> CoreError {
    policy_error_for_operation("client_init", err)
}

fn policy_error_for_operation(operation: &'static str, err: HttpPolicyError) -> CoreError {
    match err {
        HttpPolicyError::PolicyViolation(detail) => CoreError::InvalidResponse { source: SOURCE, detail },
        HttpPolicyError::RequestFailed(detail) => CoreError::Transient { operation, detail },
        HttpPolicyError::ResponseTooLarge => CoreError::Transient {
            operation,
            detail: "response exceeded size limit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_content_from_well_formed_response() {
        let body = serde_json::json!({
            "choices": [{ "message": { "content": "hello" } }]
        });
        let content = body
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str);
        assert_eq!(content, Some("hello"));
    }

    #[test]
    fn client_builds_from_default_policy() {
        let client = LlmHttpClient::new(LlmHttpConfig {
            base_url: "https://api.example.com/v1".to_string(),
            api_key: "key".to_string(),
            model: "gpt-test".to_string(),
            http: HttpPolicyConfig::default(),
        });
        assert!(client.is_ok());
    }
}
