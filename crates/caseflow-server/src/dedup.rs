// crates/caseflow-server/src/dedup.rs
// ============================================================================
// Module: Inbound Request Dedup Window
// Description: A short-lived, in-memory window keyed by `{source,
//              external_id}`, rejecting a webhook delivery this process has
//              already accepted.
// Purpose: Let `spec.md` §4.1's "at-least-once" delivery assumption (Slack
//          and ServiceNow both retry on a slow response) collapse to
//          effectively-once handling without a durable dedup table.
// Dependencies: none (std only)
// ============================================================================

//! ## Overview
//! Entries expire after a fixed window; a lookup also evicts everything
//! older than the window so the map cannot grow unbounded across a long
//! process lifetime. This mirrors a TTL cache, not a persisted ledger — a
//! process restart forgets every key, which is acceptable because the
//! sender's own retry behavior (seconds to low minutes) is what the window
//! defends against, not a replay days later.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

/// Default dedup window: five minutes, per `spec.md` §4.1.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5 * 60);

/// A `{source, external_id}` dedup window.
pub struct DedupWindow {
    window: Duration,
    seen: Mutex<HashMap<(String, String), Instant>>,
}

impl DedupWindow {
    /// Builds a window with the given retention duration.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Records `(source, external_id)` as seen and returns `true` if it was
    /// already present within the window (i.e. this delivery is a
    /// duplicate). Also evicts every entry older than the window.
    pub fn check_and_record(&self, source: &str, external_id: &str) -> bool {
        let now = Instant::now();
        let key = (source.to_string(), external_id.to_string());
        let mut seen = self.seen.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        seen.retain(|_, seen_at| now.duration_since(*seen_at) < self.window);
        if seen.contains_key(&key) {
            return true;
        }
        seen.insert(key, now);
        false
    }
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_delivery_of_the_same_key_is_flagged_a_duplicate() {
        let window = DedupWindow::default();
        assert!(!window.check_and_record("servicenow", "case-1"));
        assert!(window.check_and_record("servicenow", "case-1"));
    }

    #[test]
    fn different_sources_do_not_collide_on_the_same_external_id() {
        let window = DedupWindow::default();
        assert!(!window.check_and_record("servicenow", "id-1"));
        assert!(!window.check_and_record("slack", "id-1"));
    }

    #[test]
    fn entries_older_than_the_window_are_evicted_and_not_treated_as_duplicates() {
        let window = DedupWindow::new(Duration::from_millis(10));
        assert!(!window.check_and_record("servicenow", "case-2"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(!window.check_and_record("servicenow", "case-2"));
    }
}
