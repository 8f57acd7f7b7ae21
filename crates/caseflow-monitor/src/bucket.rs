// crates/caseflow-monitor/src/bucket.rs
// ============================================================================
// Module: Stuck-Case Severity Buckets
// Description: Classifies blocked gates into Warning/Critical/Alert buckets
//              by age.
// ============================================================================

use std::collections::HashSet;

use caseflow_config::MonitorConfig;
use caseflow_core::{CoreError, GateId, GateStore, QualityGateRecord};

/// Blocked gates bucketed by how long they have been blocked, each bucket
/// excluding gates that also qualify for a more severe bucket.
#[derive(Debug, Clone, Default)]
pub struct BucketedGates {
    /// Blocked `warning_hours..critical_hours`.
    pub warning: Vec<QualityGateRecord>,
    /// Blocked `critical_hours..alert_hours`.
    pub critical: Vec<QualityGateRecord>,
    /// Blocked `>= alert_hours`.
    pub alert: Vec<QualityGateRecord>,
}

/// Converts an hours threshold to whole seconds for
/// [`GateStore::find_blocked_older_than`].
#[must_use]
fn hours_to_secs(hours: f64) -> u64 {
    #[allow(
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation,
        reason = "monitor thresholds are always positive and validated by caseflow-config"
    )]
    let secs = (hours * 3600.0).round() as u64;
    secs
}

/// Queries `store` at each severity threshold and subtracts the more severe
/// buckets from the less severe ones, so a gate blocked 30 hours appears
/// only in `alert`, not also in `warning` and `critical`.
///
/// # Errors
/// Returns [`CoreError`] if the underlying store query fails.
pub fn bucket_blocked_gates(store: &dyn GateStore, config: &MonitorConfig) -> Result<BucketedGates, CoreError> {
    let over_warning = store.find_blocked_older_than(hours_to_secs(config.warning_hours))?;
    let over_critical = store.find_blocked_older_than(hours_to_secs(config.critical_hours))?;
    let over_alert = store.find_blocked_older_than(hours_to_secs(config.alert_hours))?;

    let critical_ids: HashSet<GateId> = over_critical.iter().map(|g| g.id).collect();
    let alert_ids: HashSet<GateId> = over_alert.iter().map(|g| g.id).collect();

    let warning = over_warning
        .into_iter()
        .filter(|g| !critical_ids.contains(&g.id))
        .collect();
    let critical = over_critical
        .into_iter()
        .filter(|g| !alert_ids.contains(&g.id))
        .collect();

    Ok(BucketedGates {
        warning,
        critical,
        alert: over_alert,
    })
}

/// Returns the `limit` oldest (longest-blocked) gates from `gates`, sorted
/// ascending by `created_at`.
#[must_use]
pub fn longest_blocked(gates: &[QualityGateRecord], limit: usize) -> Vec<&QualityGateRecord> {
    let mut sorted: Vec<&QualityGateRecord> = gates.iter().collect();
    sorted.sort_by_key(|g| g.created_at);
    sorted.into_iter().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hours_to_secs_rounds_reasonably() {
        assert_eq!(hours_to_secs(4.0), 14_400);
        assert_eq!(hours_to_secs(24.0), 86_400);
    }
}
