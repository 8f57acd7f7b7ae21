// crates/caseflow-escalation/src/slack_payload.rs
// ============================================================================
// Module: Escalation Slack Payload
// Description: Builds the Slack Block Kit payload for an escalation post
//              and for stuck-case summary notifications.
// ============================================================================

use caseflow_core::{Case, Escalation};
use serde_json::Value;
use serde_json::json;

/// Builds the Block Kit `blocks` array for an escalation post: a header,
/// a section with case identifiers and BI score, a context line naming the
/// routing rule and reason, and acknowledgement action buttons.
#[must_use]
pub fn build_blocks(escalation: &Escalation, case: &Case, reason: &str) -> Value {
    json!([
        {
            "type": "header",
            "text": {
                "type": "plain_text",
                "text": format!("Escalation: {}", escalation.case_number),
                "emoji": true
            }
        },
        {
            "type": "section",
            "fields": [
                { "type": "mrkdwn", "text": format!("*Case:*\n{}", escalation.case_number) },
                { "type": "mrkdwn", "text": format!("*Company:*\n{}", case.company) },
                { "type": "mrkdwn", "text": format!("*BI score:*\n{:.2}", escalation.bi_score) },
                { "type": "mrkdwn", "text": format!("*Routing rule:*\n{}", escalation.routing_rule_name) },
            ]
        },
        {
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Short description:*\n{}", case.short_description) }
        },
        {
            "type": "context",
            "elements": [
                { "type": "mrkdwn", "text": format!("Reason: {reason}") }
            ]
        },
        {
            "type": "actions",
            "block_id": "escalation_actions",
            "elements": [
                {
                    "type": "button",
                    "text": { "type": "plain_text", "text": "Acknowledge", "emoji": true },
                    "style": "primary",
                    "action_id": "escalation_acknowledge",
                    "value": escalation.id.to_string()
                }
            ]
        }
    ])
}

/// Builds a compact Block Kit payload for the stuck-case monitor's Alert
/// bucket escalations and summary posts, which carry no routing rule and no
/// acknowledge button.
#[must_use]
pub fn build_summary_blocks(title: &str, lines: &[String]) -> Value {
    let mut blocks = vec![json!({
        "type": "header",
        "text": { "type": "plain_text", "text": title, "emoji": true }
    })];
    if lines.is_empty() {
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": "_nothing to report_" }
        }));
    } else {
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": lines.join("\n") }
        }));
    }
    Value::Array(blocks)
}

#[cfg(test)]
mod tests {
    use caseflow_core::{CaseId, EscalationId, EscalationStatus, Timestamp};

    use super::*;

    #[test]
    fn blocks_contain_header_and_actions() {
        let case = Case {
            id: CaseId::new("c-1"),
            number: "CS0000001".to_string(),
            short_description: "VPN down".to_string(),
            long_description: None,
            priority: 1,
            urgency: 1,
            company: "Acme".to_string(),
            assignment_group: None,
            account: None,
            current_category: None,
        };
        let escalation = Escalation {
            id: EscalationId::from_raw(1).expect("nonzero"),
            case_number: "CS0000001".to_string(),
            triggers: vec![],
            bi_score: 0.8,
            routing_rule_name: "compliance".to_string(),
            channel: "C123".to_string(),
            slack_message: None,
            status: EscalationStatus::Pending,
            created_at: Timestamp::now(),
            acknowledged_at: None,
        };
        let blocks = build_blocks(&escalation, &case, "compliance impact");
        let rendered = blocks.to_string();
        assert!(rendered.contains("CS0000001"));
        assert!(rendered.contains("escalation_acknowledge"));
    }
}
