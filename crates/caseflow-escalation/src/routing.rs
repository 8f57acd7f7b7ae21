// crates/caseflow-escalation/src/routing.rs
// ============================================================================
// Module: Escalation Channel Routing
// Description: Ordered rule-priority channel selection.
// ============================================================================

use caseflow_config::EscalationRoutingRule;
use thiserror::Error;

/// Raised when no routing rule matches, which `caseflow-config`'s
/// `Config::validate` should make unreachable (a wildcard default rule is
/// mandatory), but is still modeled as a recoverable error rather than a
/// panic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("no escalation routing rule matched client={client:?} category={category:?} assignment_group={assignment_group:?}, and no default rule is configured")]
pub struct NoMatchingRuleError {
    /// Client that was being routed.
    pub client: String,
    /// Category that was being routed.
    pub category: String,
    /// Assignment group that was being routed.
    pub assignment_group: String,
}

/// Selects the highest-priority routing rule whose predicates match, trying
/// rules in descending `priority` order. A rule with `client = "*"`/`None`
/// and no other predicates is the mandatory default and always matches.
///
/// # Errors
/// Returns [`NoMatchingRuleError`] if no rule matches, which should not
/// happen against a config that passed [`caseflow_config::Config::validate`].
pub fn select_channel<'a>(
    rules: &'a [EscalationRoutingRule],
    client: &str,
    category: &str,
    assignment_group: &str,
) -> Result<&'a EscalationRoutingRule, NoMatchingRuleError> {
    let mut ordered: Vec<&EscalationRoutingRule> = rules.iter().collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    ordered
        .into_iter()
        .find(|rule| rule.matches(client, category, assignment_group))
        .ok_or_else(|| NoMatchingRuleError {
            client: client.to_string(),
            category: category.to_string(),
            assignment_group: assignment_group.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, priority: i32, client: Option<&str>, category: Option<&str>) -> EscalationRoutingRule {
        EscalationRoutingRule {
            name: name.to_string(),
            priority,
            client: client.map(str::to_string),
            category: category.map(str::to_string),
            assignment_group: None,
            channel: format!("C_{name}"),
        }
    }

    #[test]
    fn most_specific_rule_wins_by_priority() {
        let rules = vec![
            rule("default", 0, None, None),
            rule("acme_network", 10, Some("Acme"), Some("Network")),
            rule("acme_any", 5, Some("Acme"), None),
        ];
        let chosen = select_channel(&rules, "Acme", "Network", "").expect("matches");
        assert_eq!(chosen.name, "acme_network");
    }

    #[test]
    fn falls_back_to_default_when_nothing_specific_matches() {
        let rules = vec![rule("default", 0, None, None), rule("acme_only", 10, Some("Acme"), None)];
        let chosen = select_channel(&rules, "Globex", "Network", "").expect("matches");
        assert_eq!(chosen.name, "default");
    }
}
