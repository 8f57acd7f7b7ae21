// crates/caseflow-providers/src/slack.rs
// ============================================================================
// Module: Slack HTTP Client
// Description: Outbound Slack message posting and inbound request signature
//              verification.
// Purpose: Give the escalation router and clarification session FSM a real
//          Slack backend.
// Dependencies: caseflow-core, hmac, reqwest, serde_json, sha2
// ============================================================================

//! ## Overview
//! [`SlackHttpClient::verify_signature`] implements Slack's
//! `v0={hex(hmac_sha256("v0:{timestamp}:{body}"))}` signing scheme, the same
//! scheme every inbound Slack surface (events, commands, interactivity) uses.

use hmac::Hmac;
use hmac::Mac;
use reqwest::Method;
use serde_json::Value;
use sha2::Sha256;

use caseflow_core::CoreError;
use caseflow_core::SlackClient;

use crate::http_policy::HttpPolicyConfig;
use crate::http_policy::HttpPolicyError;
use crate::http_policy::PolicedHttpClient;

type HmacSha256 = Hmac<Sha256>;

const SOURCE: &str = "slack";
const SIGNATURE_VERSION: &str = "v0";

/// Connection configuration for [`SlackHttpClient`].
#[derive(Debug, Clone)]
pub struct SlackHttpConfig {
    /// Slack Web API base URL, normally `https://slack.com/api`.
    pub api_base_url: String,
    /// Bot token used for outbound `chat.postMessage` calls.
    pub bot_token: String,
    /// Signing secret used to verify inbound request signatures.
    pub signing_secret: String,
    /// Outbound request policy.
    pub http: HttpPolicyConfig,
}

/// A Slack Web API-backed implementation of [`SlackClient`].
pub struct SlackHttpClient {
    config: SlackHttpConfig,
    http: PolicedHttpClient,
}

impl SlackHttpClient {
    /// Builds a client from `config`.
    ///
    /// # Errors
    /// Returns [`CoreError::Transient`] if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(config: SlackHttpConfig) -> Result<Self, CoreError> {
        let http = PolicedHttpClient::new(config.http.clone()).map_err(policy_error)?;
        Ok(Self { config, http })
    }
}

impl SlackClient for SlackHttpClient {
    fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        blocks: Value,
    ) -> Result<(String, String), CoreError> {
        let mut body = serde_json::json!({
            "channel": channel,
            "blocks": blocks,
        });
        if let Some(thread_ts) = thread_ts {
            body["thread_ts"] = Value::String(thread_ts.to_string());
        }
        let payload = serde_json::to_vec(&body)
            .map_err(|err| CoreError::InvalidResponse {
                source: SOURCE,
                detail: format!("failed to encode request body: {err}"),
            })?;
        let url = format!("{}/chat.postMessage", self.config.api_base_url.trim_end_matches('/'));
        let response = self
            .http
            .execute(
                Method::POST,
                &url,
                &[
                    ("authorization", format!("Bearer {}", self.config.bot_token)),
                    ("content-type", "application/json".to_string()),
                ],
                Some(payload),
            )
            .map_err(policy_error)?;
        let parsed: Value = serde_json::from_slice(&response.body).map_err(|err| CoreError::InvalidResponse {
            source: SOURCE,
            detail: format!("invalid JSON response: {err}"),
        })?;
        if !parsed.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let detail = parsed.get("error").and_then(Value::as_str).unwrap_or("unknown error").to_string();
            return Err(CoreError::InvalidResponse { source: SOURCE, detail });
        }
        let channel = parsed.get("channel").and_then(Value::as_str).unwrap_or(channel).to_string();
        let ts = parsed
            .get("ts")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::InvalidResponse {
                source: SOURCE,
                detail: "response missing ts field".to_string(),
            })?
            .to_string();
        Ok((channel, ts))
    }

    fn verify_signature(&self, timestamp: &str, raw_body: &[u8], signature: &str) -> Result<(), CoreError> {
        let expected_prefix = format!("{SIGNATURE_VERSION}=");
        let Some(provided_hex) = signature.strip_prefix(&expected_prefix) else {
            return Err(CoreError::Unauthorized(SOURCE));
        };
        let provided = hex_decode(provided_hex).ok_or(CoreError::Unauthorized(SOURCE))?;
        let mut mac = HmacSha256::new_from_slice(self.config.signing_secret.as_bytes())
            .map_err(|_| CoreError::Unauthorized(SOURCE))?;
        mac.update(SIGNATURE_VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(raw_body);
        mac.verify_slice(&provided).map_err(|_| CoreError::Unauthorized(SOURCE))
    }
}

fn policy_error(err: HttpPolicyError) -> CoreError {
    match err {
        HttpPolicyError::PolicyViolation(detail) => CoreError::InvalidResponse { source: SOURCE, detail },
        HttpPolicyError::RequestFailed(detail) => CoreError::Transient {
            operation: "post_message",
            detail,
        },
        HttpPolicyError::ResponseTooLarge => CoreError::Transient {
            operation: "post_message",
            detail: "response exceeded size limit".to_string(),
        },
    }
}

fn hex_decode(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 {
        return None;
    }
    (0..input.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(input.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SlackHttpClient {
        SlackHttpClient::new(SlackHttpConfig {
            api_base_url: "https://slack.com/api".to_string(),
            bot_token: "xoxb-test".to_string(),
            signing_secret: "shh".to_string(),
            http: HttpPolicyConfig::default(),
        })
        .expect("client builds")
    }

    #[test]
    fn verify_signature_accepts_matching_hmac_and_rejects_tampered_body() {
        let client = client();
        let timestamp = "1700000000";
        let body = b"token=abc&team_id=T1";
        let mut mac = HmacSha256::new_from_slice(b"shh").expect("valid key length");
        mac.update(b"v0:");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        let signature = format!("v0={}", hex_encode(&mac.finalize().into_bytes()));

        assert!(client.verify_signature(timestamp, body, &signature).is_ok());
        assert!(client.verify_signature(timestamp, b"tampered", &signature).is_err());
    }

    #[test]
    fn verify_signature_rejects_missing_version_prefix() {
        let client = client();
        assert!(client.verify_signature("1700000000", b"body", "deadbeef").is_err());
    }

    fn hex_encode(bytes: &[u8]) -> String {
        bytes.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}
