// crates/caseflow-broker/src/payload.rs
// ============================================================================
// Module: Job Envelope & Signing
// Description: The wire shape published onto the task queue, plus the
//              HMAC-SHA256 signing scheme the worker endpoint verifies.
// Purpose: Give the HTTP sink and the worker's inbound handler one shared
//          canonical job representation and signature contract.
// Dependencies: caseflow-core, hmac, serde, serde_json, sha2
// ============================================================================

//! ## Overview
//! A [`JobEnvelope`] carries the idempotency key the handler must dedup on
//! (`{case_id}:{stage}`, per `spec.md` §4.2) and the job's JSON payload.
//! [`sign`] and [`verify`] implement the same `hex(hmac_sha256(body))`
//! scheme `caseflow-providers::slack` and `::servicenow` use for inbound
//! webhook authentication, applied here to outbound job delivery instead.

use hmac::Hmac;
use hmac::Mac;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use caseflow_core::CoreError;
use caseflow_core::Timestamp;

type HmacSha256 = Hmac<Sha256>;

/// A single unit of work published onto the task queue.
///
/// # Invariants
/// - `idempotency_key` is always `{case_id}:{stage}`; the worker handling
///   this job must dedup on this key rather than re-deriving one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    /// Dedup key the consumer must treat idempotently.
    pub idempotency_key: String,
    /// Job payload, opaque to the broker.
    pub payload: serde_json::Value,
    /// When this job was published.
    pub enqueued_at: Timestamp,
}

impl JobEnvelope {
    /// Serializes this envelope to the canonical JSON bytes signed and
    /// verified by [`sign`]/[`verify`].
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidResponse`] if serialization fails, which
    /// only happens if the payload itself is not representable as JSON
    /// (never true for a `serde_json::Value`, kept for symmetry with
    /// [`verify`]'s fallible signature).
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(self).map_err(|err| CoreError::InvalidResponse {
            source: "job_envelope",
            detail: err.to_string(),
        })
    }
}

/// Computes the hex-encoded HMAC-SHA256 signature of `body` under
/// `signing_key`, carried in the `X-Caseflow-Signature` header of every
/// signed job POST.
#[must_use]
pub fn sign(signing_key: &str, body: &[u8]) -> String {
    #[allow(
        clippy::expect_used,
        reason = "HMAC accepts any key length; this construction cannot fail"
    )]
    let mut mac = HmacSha256::new_from_slice(signing_key.as_bytes()).expect("hmac accepts any key length");
    mac.update(body);
    hex_encode(&mac.finalize().into_bytes())
}

/// Verifies `signature` against `body` under `signing_key` in constant
/// time.
///
/// # Errors
/// Returns [`CoreError::Unauthorized`] if the signature does not match.
pub fn verify(signing_key: &str, body: &[u8], signature: &str) -> Result<(), CoreError> {
    let expected = sign(signing_key, body);
    let matches = expected.len() == signature.len()
        && expected
            .bytes()
            .zip(signature.bytes())
            .fold(0u8, |acc, (left, right)| acc | (left ^ right))
            == 0;
    if matches {
        Ok(())
    } else {
        Err(CoreError::Unauthorized("task_queue_signature"))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let body = b"{\"idempotency_key\":\"c-1:categorization\"}";
        let signature = sign("secret", body);
        assert!(verify("secret", body, &signature).is_ok());
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let body = b"payload";
        let signature = sign("secret", body);
        assert!(verify("other", body, &signature).is_err());
    }

    #[test]
    fn verify_rejects_tampered_body() {
        let signature = sign("secret", b"payload");
        assert!(verify("secret", b"tampered", &signature).is_err());
    }

    #[test]
    fn envelope_serializes_to_canonical_bytes() {
        let envelope = JobEnvelope {
            idempotency_key: "c-1:categorization".to_string(),
            payload: serde_json::json!({"case_id": "c-1"}),
            enqueued_at: Timestamp::now(),
        };
        let bytes = envelope.canonical_bytes().expect("serializes");
        assert!(!bytes.is_empty());
    }
}
