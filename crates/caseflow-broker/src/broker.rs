// crates/caseflow-broker/src/broker.rs
// ============================================================================
// Module: Task Queue Adapter
// Description: The `caseflow_core::TaskQueue` implementation the pipeline
//              and server publish background work through.
// Purpose: Pick the signed HTTP delivery path when a signing key is
//          configured, or fall back to immediate in-process execution
//          otherwise (`spec.md` §4.2).
// Dependencies: caseflow-core
// ============================================================================

//! ## Overview
//! [`TaskQueueAdapter`] is constructed once per process and wraps whichever
//! [`Sink`] the deployment calls for. It does not itself retry or fall
//! back between sinks at publish time — the choice of sink is made once,
//! at construction, from whether a signing key is present. This mirrors
//! [`caseflow_providers::repository::FeatureFlaggedCaseRepository`], which
//! also resolves its dispatch target once up front rather than per call.

use caseflow_core::CoreError;
use caseflow_core::TaskQueue;
use caseflow_core::Timestamp;

use crate::payload::JobEnvelope;
use crate::sink::Sink;

/// Publishes jobs through a configured [`Sink`].
pub struct TaskQueueAdapter {
    /// The delivery path jobs are published through.
    sink: Box<dyn Sink>,
}

impl TaskQueueAdapter {
    /// Builds an adapter around `sink`.
    ///
    /// Callers choose the sink: an [`crate::sink::HttpSink`] when a signing
    /// key is configured for durable, signed delivery, or an
    /// [`crate::sink::InlineSink`] when it is absent, so the dispatcher
    /// executes work immediately and surfaces failures without a retry
    /// buffer.
    #[must_use]
    pub fn new(sink: Box<dyn Sink>) -> Self {
        Self { sink }
    }
}

impl TaskQueue for TaskQueueAdapter {
    fn publish(&self, idempotency_key: &str, payload: serde_json::Value) -> Result<(), CoreError> {
        let envelope = JobEnvelope {
            idempotency_key: idempotency_key.to_string(),
            payload,
            enqueued_at: Timestamp::now(),
        };
        self.sink.deliver(&envelope)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use crate::sink::InlineSink;

    use super::*;

    #[test]
    fn publish_wraps_payload_in_an_envelope_and_delivers_it() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink = InlineSink::new(Box::new(move |envelope: &JobEnvelope| {
            #[allow(clippy::unwrap_used, reason = "test-only lock, never poisoned")]
            seen_clone.lock().unwrap().push(envelope.clone());
            Ok(())
        }));
        let adapter = TaskQueueAdapter::new(Box::new(sink));

        adapter
            .publish("c-1:categorization", serde_json::json!({"retry": false}))
            .expect("publish succeeds");

        #[allow(clippy::unwrap_used, reason = "test-only lock, never poisoned")]
        let delivered = seen.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].idempotency_key, "c-1:categorization");
    }

    #[test]
    fn publish_propagates_sink_failures() {
        let sink = InlineSink::new(Box::new(|_: &JobEnvelope| {
            Err(CoreError::Transient {
                operation: "task_queue_publish",
                detail: "worker unreachable".to_string(),
            })
        }));
        let adapter = TaskQueueAdapter::new(Box::new(sink));
        assert!(adapter.publish("c-2:validation", serde_json::json!({})).is_err());
    }
}
