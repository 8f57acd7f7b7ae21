// crates/caseflow-broker/src/lib.rs
// ============================================================================
// Crate: caseflow-broker
// Description: The Task Queue Adapter — publishes background work (stage
//              re-dispatch, reminder sweeps, escalation fan-out) either over
//              a signed HTTP call to a worker or, absent a signing key, by
//              running it in-process immediately.
// Purpose: Give the pipeline, clarification, and escalation crates one
//          `caseflow_core::TaskQueue` implementation to publish through,
//          without those crates knowing whether delivery is durable or
//          inline.
// Dependencies: caseflow-core, hmac, rand, reqwest, serde, serde_json, sha2
// ============================================================================

//! ## Overview
//! This crate has three parts:
//! - [`payload`] — the [`payload::JobEnvelope`] wire shape and the
//!   HMAC-SHA256 signing scheme shared by publisher and worker.
//! - [`sink`] — the [`sink::Sink`] trait and its two implementations,
//!   [`sink::HttpSink`] (signed, retried delivery to a worker) and
//!   [`sink::InlineSink`] (immediate in-process execution).
//! - [`broker`] — [`broker::TaskQueueAdapter`], the `caseflow_core::TaskQueue`
//!   implementation wiring a chosen sink into the rest of the system.
//!
//! Per `spec.md` §4.2, whether a signing key is configured decides the
//! sink at construction time: present, the adapter signs and durably
//! retries delivery to a worker; absent, the adapter runs jobs inline and
//! lets failures surface immediately rather than queuing them.

pub mod broker;
pub mod payload;
pub mod sink;

pub use broker::TaskQueueAdapter;
pub use payload::JobEnvelope;
pub use sink::HttpSink;
pub use sink::HttpSinkConfig;
pub use sink::InlineHandler;
pub use sink::InlineSink;
pub use sink::Sink;
