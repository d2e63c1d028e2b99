// ticketgate/src/ui/report.rs
//! Tables for `scan` and `rules` output.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

use ticketgate_core::{evaluate_risk, RiskAssessment, ScannerConfig};

use super::output_format::{styled_label, styled_outcome};

/// Renders an assessment, with the advisory verdict the gateway would attach to it.
pub fn assessment_table(assessment: &RiskAssessment, color: bool) -> Table {
    let verdict = evaluate_risk(assessment);
    let categories = if assessment.matched_categories.is_empty() {
        "none".to_string()
    } else {
        assessment.matched_categories.join(", ")
    };

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Risk".to_string(), styled_label(assessment.label, color)]);
    table.add_row(vec!["Score".to_string(), assessment.score.to_string()]);
    table.add_row(vec!["Length".to_string(), format!("{} chars", assessment.length)]);
    table.add_row(vec!["Categories".to_string(), categories]);
    table.add_row(vec!["Advisory".to_string(), styled_outcome(verdict.outcome, color)]);
    table.add_row(vec![
        "Ticket".to_string(),
        if verdict.ticket_eligible { "eligible" } else { "never issued" }.to_string(),
    ]);
    table
}

pub fn rules_table(config: &ScannerConfig) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Category", "Description"]);
    for (index, name) in config.active_rule_names().into_iter().enumerate() {
        let description = config
            .rules
            .iter()
            .find(|r| r.name == name)
            .and_then(|r| r.description.clone())
            .unwrap_or_default();
        table.add_row(vec![(index + 1).to_string(), name.to_string(), description]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketgate_core::RiskLabel;

    #[test]
    fn high_risk_table_says_no_ticket() {
        let assessment = RiskAssessment {
            score: 85,
            label: RiskLabel::High,
            matched_categories: vec!["Password".to_string()],
            length: 21,
        };
        let rendered = assessment_table(&assessment, false).to_string();
        assert!(rendered.contains("HIGH"));
        assert!(rendered.contains("Password"));
        assert!(rendered.contains("never issued"));
    }
}
