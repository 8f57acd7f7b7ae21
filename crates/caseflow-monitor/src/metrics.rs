// crates/caseflow-monitor/src/metrics.rs
// ============================================================================
// Module: Gate Metrics
// Description: Rolling 24-hour approval/block rate computation.
// ============================================================================

/// Rolling 24-hour approval/block rate snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateMetrics {
    /// Gates approved in the last 24 hours.
    pub approved_count: u64,
    /// Gates blocked in the last 24 hours.
    pub blocked_count: u64,
    /// All gates evaluated in the last 24 hours.
    pub total_count: u64,
}

impl GateMetrics {
    /// Builds a snapshot from the raw `(approved, blocked, total)` counts
    /// [`caseflow_core::GateStore::rolling_24h_counts`] returns.
    #[must_use]
    pub const fn from_counts(counts: (u64, u64, u64)) -> Self {
        let (approved_count, blocked_count, total_count) = counts;
        Self {
            approved_count,
            blocked_count,
            total_count,
        }
    }

    /// Fraction of the last 24 hours' gates that were approved, or `0.0` if
    /// none were evaluated.
    #[must_use]
    pub fn approval_rate(&self) -> f64 {
        ratio(self.approved_count, self.total_count)
    }

    /// Fraction of the last 24 hours' gates that were blocked, or `0.0` if
    /// none were evaluated.
    #[must_use]
    pub fn block_rate(&self) -> f64 {
        ratio(self.blocked_count, self.total_count)
    }
}

/// Divides `numerator` by `denominator` as `f64`, returning `0.0` rather
/// than `NaN` when `denominator` is zero.
fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    #[allow(
        clippy::cast_precision_loss,
        reason = "gate counts are far below f64's 53-bit exact-integer range"
    )]
    let value = numerator as f64 / denominator as f64;
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_compute_from_counts() {
        let metrics = GateMetrics::from_counts((80, 20, 100));
        assert!((metrics.approval_rate() - 0.8).abs() < f64::EPSILON);
        assert!((metrics.block_rate() - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_total_does_not_divide_by_zero() {
        let metrics = GateMetrics::from_counts((0, 0, 0));
        assert_eq!(metrics.approval_rate(), 0.0);
        assert_eq!(metrics.block_rate(), 0.0);
    }
}
