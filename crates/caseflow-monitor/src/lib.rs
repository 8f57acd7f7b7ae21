// crates/caseflow-monitor/src/lib.rs
// ============================================================================
// Module: Caseflow Monitor
// Description: Periodic stuck-case sweep with severity bucketing and
//              notification, plus rolling gate metrics.
// Purpose: Surface work blocked behind the quality gate before it goes
//          stale, without paging on every gate that is merely slow.
// Dependencies: caseflow-core, caseflow-config, caseflow-escalation, serde,
//               thiserror, time
// ============================================================================

//! ## Overview
//! [`StuckCaseMonitor::sweep`] is invoked by the `POST /cron/monitor-stuck-cases`
//! handler. It buckets currently blocked gates by age
//! ([`bucket::bucket_blocked_gates`]), posts one Slack message per Alert-
//! bucket case, a single summary block for Critical and a single summary
//! block for Warning (each listing the five longest-blocked cases,
//! [`bucket::longest_blocked`]), and writes an audit entry per notification
//! sent. [`metrics::GateMetrics`] is exposed separately for the
//! `case-queue-report` cron trigger, which reads it without sweeping.

pub mod bucket;
pub mod metrics;

use std::num::NonZeroU64;

use caseflow_config::MonitorConfig;
use caseflow_core::{
    AuditEntry, AuditEntryId, AuditSink, CoreError, GateStore, SlackClient, Timestamp,
};
use serde_json::json;

pub use bucket::BucketedGates;
pub use metrics::GateMetrics;

/// Placeholder id passed into [`AuditSink::append`]; concrete sinks assign
/// the real id and sequence number on write.
const PLACEHOLDER_AUDIT_ID: AuditEntryId = AuditEntryId::new(NonZeroU64::MIN);

/// Maximum number of cases listed in a Critical/Warning summary block.
const SUMMARY_LIST_LIMIT: usize = 5;

/// The result of one [`StuckCaseMonitor::sweep`] call.
#[derive(Debug, Clone)]
pub struct SweepReport {
    /// Gates bucketed by severity.
    pub buckets: BucketedGates,
    /// Number of individual Alert-bucket Slack posts sent.
    pub alert_posts_sent: usize,
    /// Whether a Critical summary block was posted (only if non-empty).
    pub critical_summary_sent: bool,
    /// Whether a Warning summary block was posted (only if non-empty).
    pub warning_summary_sent: bool,
}

/// Wires the gate store, Slack client, and audit sink the stuck-case sweep
/// needs.
pub struct StuckCaseMonitor<'a> {
    gates: &'a dyn GateStore,
    slack: &'a dyn SlackClient,
    audit: &'a dyn AuditSink,
    config: &'a MonitorConfig,
    notification_channel: &'a str,
}

impl<'a> StuckCaseMonitor<'a> {
    /// Builds a monitor posting notifications to `notification_channel`
    /// (typically the default escalation channel).
    #[must_use]
    pub const fn new(
        gates: &'a dyn GateStore,
        slack: &'a dyn SlackClient,
        audit: &'a dyn AuditSink,
        config: &'a MonitorConfig,
        notification_channel: &'a str,
    ) -> Self {
        Self {
            gates,
            slack,
            audit,
            config,
            notification_channel,
        }
    }

    /// Runs one sweep: bucket blocked gates by age, post Alert-bucket
    /// escalations individually, and post Critical/Warning summaries.
    ///
    /// # Errors
    /// Returns [`CoreError`] if the gate store query fails. Slack post
    /// failures for an individual notification are logged via a failed
    /// audit write but do not abort the remainder of the sweep.
    pub fn sweep(&self) -> Result<SweepReport, CoreError> {
        let buckets = bucket::bucket_blocked_gates(self.gates, self.config)?;

        let mut alert_posts_sent = 0;
        for gate in &buckets.alert {
            let blocks = json!([
                {
                    "type": "header",
                    "text": { "type": "plain_text", "text": format!("Stuck case alert: {}", gate.case_id), "emoji": true }
                },
                {
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": format!(
                        "Gate `{}` for case `{}` has been blocked since {} (risk: {:?}).",
                        gate.id, gate.case_id, gate.created_at, gate.risk_level
                    ) }
                }
            ]);
            if self.slack.post_message(self.notification_channel, None, blocks).is_ok() {
                alert_posts_sent += 1;
            }
            self.best_effort_audit("gate", gate.id.to_string(), "stuck_alert_notified", gate.id.get());
        }

        let critical_summary_sent = self.post_summary_if_nonempty("Critical stuck-case summary", &buckets.critical)?;
        let warning_summary_sent = self.post_summary_if_nonempty("Warning stuck-case summary", &buckets.warning)?;

        Ok(SweepReport {
            buckets,
            alert_posts_sent,
            critical_summary_sent,
            warning_summary_sent,
        })
    }

    /// Computes the rolling 24-hour approval/block rate from the gate store.
    ///
    /// # Errors
    /// Returns [`CoreError`] if the store query fails.
    pub fn metrics(&self) -> Result<GateMetrics, CoreError> {
        Ok(GateMetrics::from_counts(self.gates.rolling_24h_counts()?))
    }

    fn post_summary_if_nonempty(
        &self,
        title: &str,
        gates: &[caseflow_core::QualityGateRecord],
    ) -> Result<bool, CoreError> {
        if gates.is_empty() {
            return Ok(false);
        }
        let longest = bucket::longest_blocked(gates, SUMMARY_LIST_LIMIT);
        let lines: Vec<String> = longest
            .iter()
            .map(|gate| format!("• `{}` — case `{}`, blocked since {}", gate.id, gate.case_id, gate.created_at))
            .collect();
        let blocks = caseflow_escalation::slack_payload::build_summary_blocks(title, &lines);
        let sent = self.slack.post_message(self.notification_channel, None, blocks).is_ok();
        if sent {
            self.best_effort_audit("monitor", title.to_string(), "summary_posted", gates.len() as u64);
        }
        Ok(sent)
    }

    /// Writes an audit entry, discarding any failure.
    fn best_effort_audit(&self, entity_type: &str, entity_id: String, action: &str, count: u64) {
        let _ = self.audit.append(AuditEntry {
            id: PLACEHOLDER_AUDIT_ID,
            entity_type: entity_type.to_string(),
            entity_id,
            action: action.to_string(),
            prior_state: None,
            new_state: json!({ "count": count }),
            reason: None,
            actor: "stuck_case_monitor".to_string(),
            performed_at: Timestamp::now(),
            metadata: serde_json::Value::Null,
            sequence: 0,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use caseflow_core::{CaseId, GateId, GateStatus, QualityGateRecord, RiskLevel};

    use super::*;

    struct FakeGates {
        gates: Vec<QualityGateRecord>,
    }

    impl GateStore for FakeGates {
        fn create(&self, record: QualityGateRecord) -> Result<QualityGateRecord, CoreError> {
            Ok(record)
        }

        fn get(&self, id: GateId) -> Result<QualityGateRecord, CoreError> {
            self.gates
                .iter()
                .find(|g| g.id == id)
                .cloned()
                .ok_or(CoreError::NotFound { entity: "gate", id: id.to_string() })
        }

        fn update(&self, _record: QualityGateRecord) -> Result<(), CoreError> {
            Ok(())
        }

        fn find_blocked_older_than(&self, min_age_secs: u64) -> Result<Vec<QualityGateRecord>, CoreError> {
            let now = Timestamp::now();
            Ok(self
                .gates
                .iter()
                .filter(|g| {
                    g.blocked
                        && g.created_at
                            .elapsed_until(now)
                            .is_some_and(|d| d.whole_seconds() as u64 >= min_age_secs)
                })
                .cloned()
                .collect())
        }

        fn rolling_24h_counts(&self) -> Result<(u64, u64, u64), CoreError> {
            Ok((10, 2, 12))
        }
    }

    struct FakeSlack(RefCell<usize>);
    impl SlackClient for FakeSlack {
        fn post_message(&self, _c: &str, _t: Option<&str>, _b: serde_json::Value) -> Result<(String, String), CoreError> {
            *self.0.borrow_mut() += 1;
            Ok(("C1".to_string(), "1.0".to_string()))
        }

        fn verify_signature(&self, _t: &str, _b: &[u8], _s: &str) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct FakeAudit;
    impl AuditSink for FakeAudit {
        fn append(&self, entry: AuditEntry) -> Result<AuditEntry, CoreError> {
            Ok(entry)
        }
    }

    fn gate(hours_ago: i64, raw_id: u64) -> QualityGateRecord {
        let created_at = Timestamp::now()
            .checked_add(time::Duration::hours(-hours_ago))
            .unwrap_or_else(Timestamp::now);
        QualityGateRecord {
            id: GateId::from_raw(raw_id).unwrap_or(GateId::new(NonZeroU64::MIN)),
            case_id: CaseId::new("c-1"),
            status: GateStatus::Blocked,
            blocked: true,
            risk_level: RiskLevel::High,
            reviewer_id: None,
            review_reason: None,
            created_at,
            reviewed_at: None,
            decision_payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn alert_bucket_posts_individually() {
        let gates = FakeGates { gates: vec![gate(25, 1)] };
        let slack = FakeSlack(RefCell::new(0));
        let audit = FakeAudit;
        let config = MonitorConfig::default();
        let monitor = StuckCaseMonitor::new(&gates, &slack, &audit, &config, "C_ESC");
        let report = monitor.sweep().expect("sweeps");
        assert_eq!(report.alert_posts_sent, 1);
        assert_eq!(*slack.0.borrow(), 1);
    }

    #[test]
    fn warning_and_critical_share_summary_posts() {
        let gates = FakeGates { gates: vec![gate(5, 1), gate(9, 2)] };
        let slack = FakeSlack(RefCell::new(0));
        let audit = FakeAudit;
        let config = MonitorConfig::default();
        let monitor = StuckCaseMonitor::new(&gates, &slack, &audit, &config, "C_ESC");
        let report = monitor.sweep().expect("sweeps");
        assert!(report.warning_summary_sent);
        assert!(report.critical_summary_sent);
        assert_eq!(report.alert_posts_sent, 0);
    }

    #[test]
    fn metrics_compute_rates_from_store() {
        let gates = FakeGates { gates: vec![] };
        let slack = FakeSlack(RefCell::new(0));
        let audit = FakeAudit;
        let config = MonitorConfig::default();
        let monitor = StuckCaseMonitor::new(&gates, &slack, &audit, &config, "C_ESC");
        let metrics = monitor.metrics().expect("computes");
        assert!((metrics.approval_rate() - (10.0 / 12.0)).abs() < 1e-9);
    }
}
