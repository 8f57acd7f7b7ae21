// crates/caseflow-broker/src/sink/mod.rs
// ============================================================================
// Module: Task Queue Sinks
// Description: The delivery seam the Task Queue Adapter dispatches a
//              published job through.
// Purpose: Let `TaskQueueAdapter` be agnostic to whether a job is delivered
//          over a signed HTTP call to a worker, or executed immediately,
//          in-process, when no signing key is configured.
// Dependencies: caseflow-core
// ============================================================================

//! ## Overview
//! A [`Sink`] delivers one [`crate::payload::JobEnvelope`] and returns
//! nothing on success; failure is the caller's (`TaskQueueAdapter`'s)
//! signal to retry or surface [`caseflow_core::CoreError::Transient`].

pub mod http;
pub mod inline;

use caseflow_core::CoreError;

use crate::payload::JobEnvelope;

pub use http::HttpSink;
pub use http::HttpSinkConfig;
pub use inline::InlineHandler;
pub use inline::InlineSink;

/// Delivers a published job.
pub trait Sink: Send + Sync {
    /// Delivers `envelope`.
    ///
    /// # Errors
    /// Returns [`CoreError::Transient`] if delivery failed and the caller
    /// may retry, [`CoreError::Unauthorized`] if the worker rejected the
    /// signature it computed for its own retry path (should not happen for
    /// a sink signing its own requests).
    fn deliver(&self, envelope: &JobEnvelope) -> Result<(), CoreError>;
}
