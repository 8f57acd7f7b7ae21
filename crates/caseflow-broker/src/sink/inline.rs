// crates/caseflow-broker/src/sink/inline.rs
// ============================================================================
// Module: Inline Task Queue Sink
// Description: Executes a published job immediately, in-process, instead of
//              handing it to a worker over HTTP.
// Purpose: The fallback delivery path used when no signing key is
//          configured (`spec.md` §4.2: "the adapter is disabled and the
//          dispatcher falls back to in-process scheduling — failures then
//          surface immediately").
// Dependencies: caseflow-core
// ============================================================================

use caseflow_core::CoreError;

use crate::payload::JobEnvelope;
use crate::sink::Sink;

/// A handler invoked synchronously for every job delivered through
/// [`InlineSink`].
pub type InlineHandler = Box<dyn Fn(&JobEnvelope) -> Result<(), CoreError> + Send + Sync>;

/// Delivers jobs by invoking a handler in the calling thread, rather than
/// publishing them anywhere durable.
///
/// There is no retry here: a caller that chose the inline path already
/// chose to surface failures immediately rather than queue them.
pub struct InlineSink {
    /// The handler every delivered job is run through.
    handler: InlineHandler,
}

impl InlineSink {
    /// Builds an inline sink around `handler`.
    #[must_use]
    pub fn new(handler: InlineHandler) -> Self {
        Self { handler }
    }
}

impl Sink for InlineSink {
    fn deliver(&self, envelope: &JobEnvelope) -> Result<(), CoreError> {
        (self.handler)(envelope)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use caseflow_core::Timestamp;

    use super::*;

    #[test]
    fn delivers_by_invoking_the_handler_synchronously() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = Arc::clone(&received);
        let sink = InlineSink::new(Box::new(move |envelope: &JobEnvelope| {
            #[allow(clippy::unwrap_used, reason = "test-only lock, never poisoned")]
            received_clone.lock().unwrap().push(envelope.idempotency_key.clone());
            Ok(())
        }));

        let envelope = JobEnvelope {
            idempotency_key: "c-1:categorization".to_string(),
            payload: serde_json::json!({}),
            enqueued_at: Timestamp::now(),
        };
        assert!(sink.deliver(&envelope).is_ok());
        #[allow(clippy::unwrap_used, reason = "test-only lock, never poisoned")]
        let seen = received.lock().unwrap();
        assert_eq!(seen.as_slice(), ["c-1:categorization"]);
    }

    #[test]
    fn propagates_handler_errors() {
        let sink = InlineSink::new(Box::new(|_: &JobEnvelope| {
            Err(CoreError::Transient {
                operation: "inline_dispatch",
                detail: "handler failed".to_string(),
            })
        }));
        let envelope = JobEnvelope {
            idempotency_key: "c-2:validation".to_string(),
            payload: serde_json::json!({}),
            enqueued_at: Timestamp::now(),
        };
        assert!(sink.deliver(&envelope).is_err());
    }
}
