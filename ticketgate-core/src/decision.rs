//! decision.rs - Advisory policy over risk assessments and named scenarios.
//!
//! The verdicts produced here are metadata attached to a ticket. They decide
//! whether a ticket may be issued at all, but the binding outcome is only
//! produced when a ticket is consumed.
//!
//! License: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::risk::{RiskAssessment, RiskLabel};

/// Final or advisory outcome of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Allow,
    Block,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Allow => write!(f, "ALLOW"),
            Outcome::Block => write!(f, "BLOCK"),
        }
    }
}

/// The human's answer to an approval prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Choice {
    Allow,
    Deny,
}

impl Choice {
    /// Parses a caller-supplied choice. Only a case-insensitive `ALLOW` allows;
    /// anything else, including a missing value, is treated as `DENY`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(value) if value.trim().eq_ignore_ascii_case("allow") => Choice::Allow,
            _ => Choice::Deny,
        }
    }
}

/// `{outcome, reason}` pair returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub outcome: Outcome,
    pub reason: String,
}

impl Decision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Allow,
            reason: reason.into(),
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Block,
            reason: reason.into(),
        }
    }
}

/// Advisory verdict for a pending action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub outcome: Outcome,
    pub reason: String,
    /// Whether a human may still approve the action through a ticket.
    pub ticket_eligible: bool,
}

/// Maps a risk assessment to an advisory verdict.
///
/// High risk is blocked outright and never receives a ticket; low and medium risk
/// are eligible for human approval.
pub fn evaluate_risk(assessment: &RiskAssessment) -> Verdict {
    match assessment.label {
        RiskLabel::High => Verdict {
            outcome: Outcome::Block,
            reason: if assessment.has_secrets() {
                format!(
                    "Blocked: detected {} in the outgoing text. High-risk actions cannot be approved.",
                    assessment.matched_categories.join(", ")
                )
            } else {
                "Blocked: this action is high-risk and cannot be approved.".to_string()
            },
            ticket_eligible: false,
        },
        RiskLabel::Medium => Verdict {
            outcome: Outcome::Allow,
            reason: "Review: this is a large amount of text. Approve only if you meant to share all of it."
                .to_string(),
            ticket_eligible: true,
        },
        RiskLabel::Low => Verdict {
            outcome: Outcome::Allow,
            reason: "No sensitive patterns detected. Approval is still required before this action proceeds."
                .to_string(),
            ticket_eligible: true,
        },
    }
}

/// A scripted `{want, decision, why}` triple used for demos and testing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scenario {
    pub key: &'static str,
    pub want: &'static str,
    pub decision: Outcome,
    pub why: &'static str,
}

impl Scenario {
    pub fn verdict(&self) -> Verdict {
        Verdict {
            outcome: self.decision,
            reason: self.why.to_string(),
            ticket_eligible: self.decision == Outcome::Allow,
        }
    }
}

pub const SCENARIOS: [Scenario; 3] = [
    Scenario {
        key: "safe",
        want: "Read a file you uploaded and summarize it.",
        decision: Outcome::Allow,
        why: "This stays within your workspace and doesn't share data externally.",
    },
    Scenario {
        key: "sensitive",
        want: "Open a link and extract information.",
        decision: Outcome::Allow,
        why: "Allowed with limits: risky follow-up actions will still be blocked.",
    },
    Scenario {
        key: "risky",
        want: "Send your private data to an external website.",
        decision: Outcome::Block,
        why: "Blocked: sharing private data externally is high-risk without explicit, informed consent.",
    },
];

/// Key of the most restrictive scenario; unknown keys resolve to it.
pub const SAFEST_SCENARIO: &str = "risky";

/// Looks up a scenario by key (trimmed, case-insensitive).
///
/// Missing, unknown or malformed keys resolve to the safest scenario.
pub fn resolve_scenario(key: Option<&str>) -> &'static Scenario {
    let wanted = key.map(str::trim).unwrap_or_default();
    SCENARIOS
        .iter()
        .find(|s| s.key.eq_ignore_ascii_case(wanted))
        .or_else(|| SCENARIOS.iter().find(|s| s.key == SAFEST_SCENARIO))
        .unwrap_or(&SCENARIOS[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(label: RiskLabel, categories: &[&str]) -> RiskAssessment {
        RiskAssessment {
            score: match label {
                RiskLabel::Low => 10,
                RiskLabel::Medium => 60,
                RiskLabel::High => 85,
            },
            label,
            matched_categories: categories.iter().map(|s| s.to_string()).collect(),
            length: 10,
        }
    }

    #[test]
    fn high_risk_is_blocked_without_ticket() {
        let verdict = evaluate_risk(&assessment(RiskLabel::High, &["Password"]));
        assert_eq!(verdict.outcome, Outcome::Block);
        assert!(!verdict.ticket_eligible);
        assert!(verdict.reason.contains("Password"));
    }

    #[test]
    fn low_and_medium_are_ticket_eligible() {
        for label in [RiskLabel::Low, RiskLabel::Medium] {
            let verdict = evaluate_risk(&assessment(label, &[]));
            assert_eq!(verdict.outcome, Outcome::Allow);
            assert!(verdict.ticket_eligible);
        }
    }

    #[test]
    fn unknown_scenarios_resolve_to_the_safest() {
        for key in [None, Some(""), Some("nope"), Some("../safe"), Some("constructor")] {
            let scenario = resolve_scenario(key);
            assert_eq!(scenario.key, SAFEST_SCENARIO);
            assert_eq!(scenario.decision, Outcome::Block);
            assert!(!scenario.verdict().ticket_eligible);
        }
    }

    #[test]
    fn known_scenarios_are_case_insensitive() {
        assert_eq!(resolve_scenario(Some(" SAFE ")).key, "safe");
        assert_eq!(resolve_scenario(Some("sensitive")).decision, Outcome::Allow);
    }

    #[test]
    fn only_explicit_allow_allows() {
        assert_eq!(Choice::parse(Some("allow")), Choice::Allow);
        assert_eq!(Choice::parse(Some(" ALLOW ")), Choice::Allow);
        assert_eq!(Choice::parse(Some("yes")), Choice::Deny);
        assert_eq!(Choice::parse(None), Choice::Deny);
    }
}
