// crates/caseflow-server/src/routes.rs
// ============================================================================
// Module: HTTP Routes
// Description: The Intake Dispatcher's HTTP surface — ServiceNow and Slack
//              webhooks, cron triggers, and read-mostly admin endpoints.
// Purpose: Authenticate, dedup, and enqueue every inbound event within the
//          3-second response budget; leave the actual orchestration work to
//          `crate::worker::process_job`.
// Dependencies: axum, caseflow-broker, caseflow-core, serde_json
// ============================================================================

//! ## Overview
//! Every handler here does the same three things in the same order:
//! authenticate the caller, compute a dedup key, then hand a [`Job`] to
//! [`dispatch_job`]. What happens to that job — an HTTP POST to a signed
//! worker, or an in-process call to [`worker::process_job`] — is decided
//! once at startup by [`TaskQueueMode`] and is invisible to handlers.
//! `spec.md` §4.1's error taxonomy (`AUTH_FAILED` 401, `UNSUPPORTED_PAYLOAD`
//! 400, `QUEUE_UNAVAILABLE` 503) is carried end to end by [`ApiError`];
//! handlers never compute a status code themselves.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use caseflow_core::CaseId;
use caseflow_core::CoreError;
use caseflow_core::GateStore;
use caseflow_core::QuestionId;
use caseflow_core::ServiceNowClient;
use caseflow_core::SessionId;
use caseflow_core::SlackClient;
use caseflow_core::TaskQueue;
use serde_json::Value;
use serde_json::json;

use crate::correlation::CLIENT_CORRELATION_HEADER;
use crate::correlation::CorrelationContext;
use crate::error::ApiError;
use crate::settings::Environment;
use crate::state::AppState;
use crate::state::TaskQueueMode;
use crate::worker;
use crate::worker::Job;

/// Builds the full application [`Router`], wired against `state`.
#[must_use]
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/servicenow/webhook", post(servicenow_webhook))
        .route("/slack/events", post(slack_events))
        .route("/slack/commands/{*rest}", post(slack_commands))
        .route("/slack/interactivity", post(slack_interactivity))
        .route("/cron/{kind}", post(cron_trigger))
        .route("/admin/config", get(admin_config))
        .route("/admin/metrics", get(admin_metrics))
        .route("/admin/gates/blocked", get(admin_blocked_gates))
        .with_state(state)
}

// ============================================================================
// SECTION: ServiceNow Webhook
// ============================================================================

/// Handles `POST /servicenow/webhook`: authenticates the case-event payload,
/// dedups on the case `sys_id`, and enqueues a [`Job::ClassifyCase`].
async fn servicenow_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Result<Response, ApiError> {
    let header_map = header_map_lossy(&headers);
    state.servicenow.verify_request(&header_map, &body).map_err(ApiError::from)?;

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|err| ApiError::UnsupportedPayload(format!("servicenow webhook body: {err}")))?;
    let sys_id = servicenow_sys_id(&payload)
        .ok_or_else(|| ApiError::UnsupportedPayload("servicenow webhook payload missing sys_id".to_string()))?;

    let correlation = correlation_context(&state, &headers)?;
    if state.dedup.check_and_record("servicenow", sys_id) {
        return Ok(ack_response(StatusCode::OK, &correlation, json!({ "status": "duplicate" })));
    }

    let job = Job::ClassifyCase {
        case_id: CaseId::new(sys_id),
        caller_id: "servicenow-webhook".to_string(),
        channel_id: None,
    };
    dispatch_job(&state, job, format!("{sys_id}:classify")).await?;
    Ok(ack_response(StatusCode::OK, &correlation, json!({ "status": "accepted" })))
}

/// Reads the case `sys_id` out of a ServiceNow webhook payload, which may
/// carry the record directly or nested under a `result` envelope.
fn servicenow_sys_id(payload: &Value) -> Option<&str> {
    payload
        .get("sys_id")
        .or_else(|| payload.get("result").and_then(|result| result.get("sys_id")))
        .and_then(Value::as_str)
}

// ============================================================================
// SECTION: Slack Events, Commands, Interactivity
// ============================================================================

/// Handles `POST /slack/events`: verifies the request signature, echoes the
/// URL-verification challenge verbatim, and otherwise acknowledges.
async fn slack_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Result<Response, ApiError> {
    verify_slack_signature(&state, &headers, &body)?;
    let payload: Value =
        serde_json::from_slice(&body).map_err(|err| ApiError::UnsupportedPayload(format!("slack event body: {err}")))?;

    if payload.get("type").and_then(Value::as_str) == Some("url_verification") {
        let challenge = payload
            .get("challenge")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::UnsupportedPayload("slack url_verification missing challenge".to_string()))?;
        return Ok((StatusCode::OK, Json(json!({ "challenge": challenge }))).into_response());
    }

    if let Some(event_id) = payload.get("event_id").and_then(Value::as_str) {
        state.dedup.check_and_record("slack_event", event_id);
    }
    Ok((StatusCode::OK, Json(json!({ "status": "ok" }))).into_response())
}

/// Handles `POST /slack/commands/*`: authenticates and acknowledges within
/// the 3-second budget. Slash-command argument parsing is explicitly out of
/// scope (`spec.md` §1); this surface exists only so Slack's retry behavior
/// does not treat an unrecognized command as a delivery failure.
async fn slack_commands(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Result<Response, ApiError> {
    verify_slack_signature(&state, &headers, &body)?;
    Ok((StatusCode::OK, Json(json!({ "response_type": "ephemeral", "text": "received" }))).into_response())
}

/// Handles `POST /slack/interactivity`: authenticates a form-encoded
/// `payload` field and, for a clarification-answer `block_actions` payload,
/// enqueues a [`Job::RecordClarificationResponse`].
async fn slack_interactivity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Result<Response, ApiError> {
    verify_slack_signature(&state, &headers, &body)?;
    let form = parse_form_body(&body);
    let payload_field = form
        .get("payload")
        .ok_or_else(|| ApiError::UnsupportedPayload("slack interactivity missing payload field".to_string()))?;
    let payload: Value = serde_json::from_str(payload_field)
        .map_err(|err| ApiError::UnsupportedPayload(format!("slack interactivity payload: {err}")))?;

    if let Some(job) = clarification_response_job(&payload) {
        let idempotency_key = format!(
            "interactivity:{}",
            payload.get("action_ts").and_then(Value::as_str).unwrap_or("unknown")
        );
        dispatch_job(&state, job, idempotency_key).await?;
    }
    Ok((StatusCode::OK, Json(json!({ "status": "ok" }))).into_response())
}

/// Builds a [`Job::RecordClarificationResponse`] from a `block_actions`
/// interactivity payload whose action value is `{session_id}|{question_id}|{answer}`.
fn clarification_response_job(payload: &Value) -> Option<Job> {
    let action = payload.get("actions").and_then(Value::as_array).and_then(|actions| actions.first())?;
    let value = action.get("value").and_then(Value::as_str)?;
    let mut parts = value.splitn(3, '|');
    let session_id = parts.next()?.parse::<std::num::NonZeroU64>().ok()?;
    let question_id = parts.next()?;
    let answer = parts.next()?;
    Some(Job::RecordClarificationResponse {
        session_id: SessionId::new(session_id),
        question_id: QuestionId::new(question_id),
        value: answer.to_string(),
    })
}

/// Verifies a Slack request's signature, reading the timestamp and
/// signature headers Slack always sends alongside a signed request.
fn verify_slack_signature(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<(), ApiError> {
    let timestamp = header_str(headers, "x-slack-request-timestamp")
        .ok_or_else(|| ApiError::AuthFailed("missing x-slack-request-timestamp header".to_string()))?;
    let signature = header_str(headers, "x-slack-signature")
        .ok_or_else(|| ApiError::AuthFailed("missing x-slack-signature header".to_string()))?;
    state.slack.verify_signature(timestamp, body, signature).map_err(ApiError::from)
}

// ============================================================================
// SECTION: Cron Triggers
// ============================================================================

/// Handles `POST /cron/{kind}`: runs one of the five idempotent periodic
/// jobs named in `spec.md` §6.
async fn cron_trigger(State(state): State<Arc<AppState>>, Path(kind): Path<String>) -> Result<Response, ApiError> {
    let job = match kind.as_str() {
        "expire-clarification-sessions" => Job::ExpireClarificationSessions,
        "monitor-stuck-cases" => Job::MonitorStuckCases,
        "case-leaderboard" => Job::CaseLeaderboard,
        "case-queue-report" => Job::CaseQueueReport,
        "case-queue-snapshot" => Job::CaseQueueSnapshot,
        other => return Err(ApiError::UnsupportedPayload(format!("unknown cron trigger {other}"))),
    };
    dispatch_job(&state, job, format!("cron:{kind}")).await?;
    Ok((StatusCode::OK, Json(json!({ "status": "accepted" }))).into_response())
}

// ============================================================================
// SECTION: Admin (read-mostly)
// ============================================================================

/// Returns the current validated domain configuration.
async fn admin_config(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response, ApiError> {
    require_admin(&state, &headers)?;
    Ok((StatusCode::OK, Json(&state.config)).into_response())
}

/// Returns the rolling 24-hour approval/block metrics.
async fn admin_metrics(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response, ApiError> {
    require_admin(&state, &headers)?;
    let store = Arc::clone(&state.store);
    let counts = tokio::task::spawn_blocking(move || store.rolling_24h_counts())
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .map_err(ApiError::from)?;
    let metrics = caseflow_monitor::GateMetrics::from_counts(counts);
    Ok((
        StatusCode::OK,
        Json(json!({
            "approved_count": metrics.approved_count,
            "blocked_count": metrics.blocked_count,
            "total_count": metrics.total_count,
            "approval_rate": metrics.approval_rate(),
        })),
    )
        .into_response())
}

/// Returns every currently blocked gate, for supervisor review.
async fn admin_blocked_gates(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response, ApiError> {
    require_admin(&state, &headers)?;
    let store = Arc::clone(&state.store);
    let gates = tokio::task::spawn_blocking(move || store.find_blocked_older_than(0))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .map_err(ApiError::from)?;
    Ok((StatusCode::OK, Json(gates)).into_response())
}

/// Rejects admin requests outside [`Environment::Development`] that do not
/// carry a matching bearer token.
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if state.environment == Environment::Development {
        return Ok(());
    }
    let Some(expected) = &state.admin_bearer_token else {
        return Err(ApiError::AuthFailed("admin bearer token not configured".to_string()));
    };
    let provided = header_str(headers, "authorization").and_then(|value| value.strip_prefix("Bearer "));
    if provided == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(ApiError::AuthFailed("admin bearer token mismatch".to_string()))
    }
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Routes `job` through the signed task queue or runs it inline, per
/// [`TaskQueueMode`], off the async runtime's blocking thread pool.
async fn dispatch_job(state: &Arc<AppState>, job: Job, idempotency_key: String) -> Result<(), ApiError> {
    let state = Arc::clone(state);
    let mode = state.task_queue_mode;
    let outcome = tokio::task::spawn_blocking(move || run_job(&state, mode, &job, &idempotency_key))
        .await
        .map_err(|err| CoreError::Transient {
            operation: "dispatch_job",
            detail: err.to_string(),
        })?;
    outcome.map_err(ApiError::from)
}

/// Runs `job` either by publishing it to the signed task queue or by
/// calling [`worker::process_job`] directly, per `mode`.
fn run_job(state: &AppState, mode: TaskQueueMode, job: &Job, idempotency_key: &str) -> Result<(), CoreError> {
    match mode {
        TaskQueueMode::Signed => {
            let payload = serde_json::to_value(job).map_err(|err| CoreError::InvalidResponse {
                source: "task_queue",
                detail: err.to_string(),
            })?;
            state.task_queue.publish(idempotency_key, payload)
        }
        TaskQueueMode::Inline => worker::process_job(state, job),
    }
}

/// Builds a correlation context from the client's correlation header,
/// mapping a rejection to [`ApiError::UnsupportedPayload`].
fn correlation_context(state: &AppState, headers: &HeaderMap) -> Result<CorrelationContext, ApiError> {
    let client_header = header_str(headers, CLIENT_CORRELATION_HEADER);
    CorrelationContext::from_header(client_header, &state.correlation).map_err(ApiError::from)
}

/// Builds a `200`-class acknowledgement response carrying the server
/// correlation id header.
fn ack_response(status: StatusCode, correlation: &CorrelationContext, body: Value) -> Response {
    let mut response = (status, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(&correlation.server_id) {
        response.headers_mut().insert(crate::correlation::SERVER_CORRELATION_HEADER, value);
    }
    response
}

/// Reads a header's value as UTF-8, ignoring a header that is present but
/// not valid UTF-8 rather than failing the request.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Copies every header into a plain map for [`caseflow_core::ServiceNowClient::verify_request`],
/// which takes headers as a generic map rather than an `axum`/`http` type.
fn header_map_lossy(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string())))
        .collect()
}

/// Parses an `application/x-www-form-urlencoded` body into a key/value map.
fn parse_form_body(body: &[u8]) -> HashMap<String, String> {
    let text = String::from_utf8_lossy(body);
    text.split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((percent_decode(key), percent_decode(value)))
        })
        .collect()
}

/// Decodes a `+`-as-space, `%XX`-escaped form field. Operates on raw bytes
/// throughout so a malformed escape can never land on a non-UTF-8 boundary.
fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..=i + 2]).ok().and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match hex {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(bytes[i]);
                        i += 1;
                    }
                }
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_form_body_decodes_percent_and_plus_encoding() {
        let form = parse_form_body(b"payload=a%7Cb%7Cc&team=Acme+Corp");
        assert_eq!(form.get("payload").map(String::as_str), Some("a|b|c"));
        assert_eq!(form.get("team").map(String::as_str), Some("Acme Corp"));
    }

    #[test]
    fn clarification_response_job_reads_the_pipe_delimited_action_value() {
        let payload = json!({
            "actions": [{ "action_id": "clarify_response", "value": "7|q1|yes the CI is down" }],
        });
        let job = clarification_response_job(&payload);
        assert!(matches!(
            &job,
            Some(Job::RecordClarificationResponse { question_id, value, .. })
                if question_id.as_str() == "q1" && value == "yes the CI is down"
        ));
        if let Some(Job::RecordClarificationResponse { session_id, .. }) = job {
            assert_eq!(session_id.get(), 7);
        }
    }

    #[test]
    fn servicenow_sys_id_reads_top_level_and_nested_result_envelope() {
        assert_eq!(servicenow_sys_id(&json!({ "sys_id": "abc" })), Some("abc"));
        assert_eq!(servicenow_sys_id(&json!({ "result": { "sys_id": "def" } })), Some("def"));
        assert_eq!(servicenow_sys_id(&json!({})), None);
    }
}
