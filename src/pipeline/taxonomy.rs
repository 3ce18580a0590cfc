//! Business command taxonomy and team routing table.
//!
//! The classifier may only emit labels from [`BUSINESS_COMMANDS`]. Team tags
//! are derived from those labels through [`TEAM_ROUTES`]; anything that does
//! not route lands in `Team::General`.

use crate::pipeline::types::Team;

/// Every command label the classifier is allowed to return.
pub const BUSINESS_COMMANDS: &[&str] = &[
    // Customer relations & support
    "billing_question",
    "pricing_request",
    "general_question",
    "complaint",
    "feature_request",
    "technical_issue",
    "bug_report",
    "access_request",
    "reset_password",
    "security_alert",
    "system_down",
    "customer_testimonial",
    // Sales & business development
    "schedule_demo",
    "send_proposal",
    "follow_up",
    "renew_contract",
    "custom_plan_request",
    "partnership_request",
    "confirm_availability",
    // Operations & logistics
    "send_invoice",
    "shipping_issue",
    "delivery_update_request",
    "return_request",
    "inventory_request",
    "account_closure",
    "update_contact",
    "change_account_details",
    "duplicate_request",
    // Human resources & recruitment
    "job_application",
    "referral_submission",
    "interview_schedule_request",
    "cv_update_request",
    "hr_query",
    "employee_onboarding",
    // Legal & compliance
    "legal_inquiry",
    "contract_request",
    "privacy_policy_question",
    "data_deletion_request",
    "compliance_audit",
    "gdpr_request",
    // Marketing & communications
    "unsubscribe",
    "feedback_positive",
    "event_registration",
    "press_inquiry",
    "marketing_collaboration",
    "content_request",
    // Document & information management
    "file_request",
    "request_report",
    "request_presentation",
    "send_agreement",
    "document_approval",
    "data_export_request",
    // Internal operations
    "forward_to_support",
    "escalate_to_manager",
    "schedule_meeting",
    "project_update",
    "budget_request",
    "resource_allocation",
    // Meta actions
    "no_action",
    "requires_human_review",
    "spam_detected",
];

pub const NO_ACTION: &str = "no_action";
pub const REQUIRES_HUMAN_REVIEW: &str = "requires_human_review";
pub const SPAM_DETECTED: &str = "spam_detected";

/// Team → commands routed to it. Order decides the primary team when a
/// message routes to several.
pub const TEAM_ROUTES: &[(Team, &[&str])] = &[
    (
        Team::Sales,
        &[
            "schedule_demo",
            "send_proposal",
            "custom_plan_request",
            "partnership_request",
            "confirm_availability",
            "renew_contract",
        ],
    ),
    (
        Team::Support,
        &[
            "technical_issue",
            "bug_report",
            "access_request",
            "reset_password",
            "security_alert",
            "system_down",
            "general_question",
        ],
    ),
    (
        Team::Hr,
        &[
            "job_application",
            "referral_submission",
            "interview_schedule_request",
            "cv_update_request",
            "hr_query",
            "employee_onboarding",
        ],
    ),
    (
        Team::Finance,
        &[
            "billing_question",
            "send_invoice",
            "pricing_request",
            "account_closure",
            "budget_request",
        ],
    ),
    (
        Team::Legal,
        &[
            "legal_inquiry",
            "contract_request",
            "privacy_policy_question",
            "data_deletion_request",
            "compliance_audit",
            "gdpr_request",
        ],
    ),
    (
        Team::Operations,
        &[
            "shipping_issue",
            "delivery_update_request",
            "return_request",
            "inventory_request",
            "resource_allocation",
        ],
    ),
    (
        Team::Marketing,
        &[
            "unsubscribe",
            "event_registration",
            "press_inquiry",
            "marketing_collaboration",
            "content_request",
        ],
    ),
];

/// Whether `label` is part of the taxonomy.
pub fn is_known_command(label: &str) -> bool {
    BUSINESS_COMMANDS.contains(&label)
}

/// Keep only known labels (normalized, deduplicated, in input order).
/// An empty result becomes `["no_action"]`.
pub fn normalize_commands<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for label in labels {
        let label = label.as_ref().trim().to_lowercase().replace([' ', '-'], "_");
        if is_known_command(&label) && !out.contains(&label) {
            out.push(label);
        }
    }
    if out.is_empty() {
        out.push(NO_ACTION.to_string());
    }
    out
}

/// Teams the commands route to, in table order. Never empty.
pub fn team_tags(commands: &[String]) -> Vec<Team> {
    let tags: Vec<Team> = TEAM_ROUTES
        .iter()
        .filter(|(_, routed)| commands.iter().any(|c| routed.contains(&c.as_str())))
        .map(|(team, _)| *team)
        .collect();
    if tags.is_empty() {
        vec![Team::General]
    } else {
        tags
    }
}

/// Whether the commands say no reply should be drafted.
pub fn is_non_actionable(commands: &[String]) -> bool {
    commands.iter().any(|c| c == NO_ACTION || c == SPAM_DETECTED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_has_no_duplicates() {
        let mut sorted: Vec<&str> = BUSINESS_COMMANDS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), BUSINESS_COMMANDS.len());
    }

    #[test]
    fn every_routed_command_is_in_taxonomy() {
        for (team, commands) in TEAM_ROUTES {
            for c in *commands {
                assert!(is_known_command(c), "{c} routed to {team:?} is not in taxonomy");
            }
        }
    }

    #[test]
    fn normalize_drops_unknown_and_dedups() {
        let out = normalize_commands(["Schedule Demo", "made_up", "schedule_demo", "bug-report"]);
        assert_eq!(out, vec!["schedule_demo", "bug_report"]);
    }

    #[test]
    fn normalize_empty_becomes_no_action() {
        let out = normalize_commands(Vec::<String>::new());
        assert_eq!(out, vec!["no_action"]);
        let out = normalize_commands(["not_a_command"]);
        assert_eq!(out, vec!["no_action"]);
    }

    #[test]
    fn team_tags_route_multiple_teams() {
        let commands = vec!["schedule_demo".to_string(), "gdpr_request".to_string()];
        assert_eq!(team_tags(&commands), vec![Team::Sales, Team::Legal]);
    }

    #[test]
    fn unrouted_commands_go_to_general() {
        let commands = vec!["follow_up".to_string()];
        assert_eq!(team_tags(&commands), vec![Team::General]);
    }

    #[test]
    fn non_actionable_detection() {
        assert!(is_non_actionable(&["spam_detected".to_string()]));
        assert!(is_non_actionable(&["no_action".to_string()]));
        assert!(!is_non_actionable(&["complaint".to_string()]));
    }
}
