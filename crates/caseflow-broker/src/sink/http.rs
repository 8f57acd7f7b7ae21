// crates/caseflow-broker/src/sink/http.rs
// ============================================================================
// Module: HTTP Task Queue Sink
// Description: Publishes a signed job to a worker URL, retrying with
//              exponential backoff and jitter.
// Purpose: The Task Queue Adapter's durable delivery path (`spec.md` §4.2).
// Dependencies: caseflow-core, rand, reqwest
// ============================================================================

//! ## Overview
//! Every POST carries the job body plus an `X-Caseflow-Signature` header
//! the worker verifies with [`crate::payload::verify`] before handling the
//! job. Delivery retries up to [`MAX_ATTEMPTS`] times with a base delay of
//! [`BASE_DELAY`] doubling each attempt, plus up to 25% random jitter, so
//! concurrent retries across many jobs do not all land on the worker at
//! once.

use std::time::Duration;

use rand::Rng;
use reqwest::Method;
use reqwest::blocking::Client;

use caseflow_core::CoreError;

use crate::payload::JobEnvelope;
use crate::payload::sign;
use crate::sink::Sink;

/// Base retry delay; attempt `n` (0-indexed) waits `BASE_DELAY * 2^n` before
/// jitter.
const BASE_DELAY: Duration = Duration::from_secs(1);
/// Maximum number of delivery attempts before the sink gives up.
const MAX_ATTEMPTS: u32 = 6;
/// Upper bound on jitter as a fraction of the computed backoff delay.
const JITTER_FRACTION: f64 = 0.25;

/// Configuration for [`HttpSink`].
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Worker URL jobs are POSTed to.
    pub worker_url: String,
    /// Shared signing key every job is HMAC-signed with.
    pub signing_key: String,
    /// Per-attempt request timeout.
    pub request_timeout: Duration,
}

/// Delivers jobs to a worker over a signed HTTP POST, with retry and
/// jitter.
pub struct HttpSink {
    config: HttpSinkConfig,
    client: Client,
}

impl HttpSink {
    /// Builds a sink from `config`.
    ///
    /// # Errors
    /// Returns [`CoreError::Transient`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: HttpSinkConfig) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| CoreError::Transient {
                operation: "task_queue_http_sink_init",
                detail: err.to_string(),
            })?;
        Ok(Self { config, client })
    }

    fn delay_for_attempt(attempt: u32) -> Duration {
        let exponent = attempt.min(MAX_ATTEMPTS - 1);
        let base = BASE_DELAY.saturating_mul(1u32 << exponent);
        let jitter_ratio = rand::thread_rng().gen_range(0.0..JITTER_FRACTION);
        base.mul_f64(1.0 + jitter_ratio)
    }
}

impl Sink for HttpSink {
    fn deliver(&self, envelope: &JobEnvelope) -> Result<(), CoreError> {
        let body = envelope.canonical_bytes()?;
        let signature = sign(&self.config.signing_key, &body);

        let mut last_error = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                std::thread::sleep(Self::delay_for_attempt(attempt - 1));
            }
            let result = self
                .client
                .request(Method::POST, &self.config.worker_url)
                .header("Content-Type", "application/json")
                .header("X-Caseflow-Signature", &signature)
                .header("X-Caseflow-Idempotency-Key", &envelope.idempotency_key)
                .body(body.clone())
                .send();
            match result {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    last_error = Some(format!("worker returned status {}", response.status()));
                }
                Err(err) => last_error = Some(err.to_string()),
            }
        }

        Err(CoreError::Transient {
            operation: "task_queue_publish",
            detail: last_error.unwrap_or_else(|| "exhausted retries".to_string()),
        })
    }
}
