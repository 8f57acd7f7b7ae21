// crates/caseflow-providers/src/embedding.rs
// ============================================================================
// Module: Embedding HTTP Client
// Description: Vector embedding calls against an OpenAI-compatible endpoint.
// Purpose: Back the muscle-memory retriever's cosine-similarity search with
//          real embeddings.
// Dependencies: caseflow-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! `POST {base_url}/embeddings` with `{"model": ..., "input": text}`,
//! returning `data[0].embedding`. The response is validated against
//! [`caseflow_core::EMBEDDING_DIMENSIONS`] before it reaches the muscle-memory
//! retriever — a provider returning the wrong dimensionality is a hard
//! [`CoreError::InvalidResponse`], not a silently truncated vector.

use reqwest::Method;
use serde_json::Value;

use caseflow_core::CoreError;
use caseflow_core::EMBEDDING_DIMENSIONS;
use caseflow_core::EmbeddingClient;

use crate::http_policy::HttpPolicyConfig;
use crate::http_policy::HttpPolicyError;
use crate::http_policy::PolicedHttpClient;

const SOURCE: &str = "embedding";

/// Connection configuration for [`EmbeddingHttpClient`].
#[derive(Debug, Clone)]
pub struct EmbeddingHttpConfig {
    /// Endpoint base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Model identifier to request.
    pub model: String,
    /// Outbound request policy.
    pub http: HttpPolicyConfig,
}

/// An OpenAI-compatible embeddings implementation of [`EmbeddingClient`].
pub struct EmbeddingHttpClient {
    config: EmbeddingHttpConfig,
    http: PolicedHttpClient,
}

impl EmbeddingHttpClient {
    /// Builds a client from `config`.
    ///
    /// # Errors
    /// Returns [`CoreError::Transient`] if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(config: EmbeddingHttpConfig) -> Result<Self, CoreError> {
        let http = PolicedHttpClient::new(config.http.clone()).map_err(policy_error)?;
        Ok(Self { config, http })
    }
}

impl EmbeddingClient for EmbeddingHttpClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "input": text,
        });
        let payload = serde_json::to_vec(&body).map_err(|err| CoreError::InvalidResponse {
            source: SOURCE,
            detail: format!("failed to encode request body: {err}"),
        })?;
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
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
            .map_err(policy_error)?;
        if response.status == 429 || response.status >= 500 {
            return Err(CoreError::Transient {
                operation: "embed",
                detail: format!("embedding endpoint returned status {}", response.status),
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
        let raw = parsed
            .get("data")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .and_then(|row| row.get("embedding"))
            .and_then(Value::as_array)
            .ok_or_else(|| CoreError::InvalidResponse {
                source: SOURCE,
                detail: "response missing data[0].embedding".to_string(),
            })?;
        let embedding: Vec<f32> = raw
            .iter()
            .map(|value| value.as_f64().map(|v| v as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| CoreError::InvalidResponse {
                source: SOURCE,
                detail: "embedding vector contained a non-numeric element".to_string(),
            })?;
        if embedding.len() != EMBEDDING_DIMENSIONS {
            return Err(CoreError::InvalidResponse {
                source: SOURCE,
                detail: format!(
                    "expected {EMBEDDING_DIMENSIONS}-dimensional embedding, got {}",
                    embedding.len()
                ),
            });
        }
        Ok(embedding)
    }
}

fn policy_error(err: HttpPolicyError) -> CoreError {
    match err {
        HttpPolicyError::PolicyViolation(detail) => CoreError::InvalidResponse { source: SOURCE, detail },
        HttpPolicyError::RequestFailed(detail) => CoreError::Transient {
            operation: "embed",
            detail,
        },
        HttpPolicyError::ResponseTooLarge => CoreError::Transient {
            operation: "embed",
            detail: "response exceeded size limit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_dimensionality() {
        let short_vector: Vec<f32> = vec![0.0; 4];
        assert_ne!(short_vector.len(), EMBEDDING_DIMENSIONS);
    }

    #[test]
    fn client_builds_from_default_policy() {
        let client = EmbeddingHttpClient::new(EmbeddingHttpConfig {
            base_url: "https://api.example.com/v1".to_string(),
            api_key: "key".to_string(),
            model: "embedding-test".to_string(),
            http: HttpPolicyConfig::default(),
        });
        assert!(client.is_ok());
    }
}
