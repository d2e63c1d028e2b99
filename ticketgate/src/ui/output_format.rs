// ticketgate/src/ui/output_format.rs
//! Coloured status lines for stderr and risk-label styling.
//!
//! Colour is only applied when the caller says the target is a terminal.

use owo_colors::OwoColorize;
use std::io::{self, Write};

use ticketgate_core::{Outcome, RiskLabel};

pub fn print_info_message<W: Write>(writer: &mut W, msg: &str, color: bool) -> io::Result<()> {
    if color {
        writeln!(writer, "{} {}", "info:".cyan().bold(), msg)
    } else {
        writeln!(writer, "info: {msg}")
    }
}

pub fn print_warn_message<W: Write>(writer: &mut W, msg: &str, color: bool) -> io::Result<()> {
    if color {
        writeln!(writer, "{} {}", "warning:".yellow().bold(), msg)
    } else {
        writeln!(writer, "warning: {msg}")
    }
}

pub fn print_error_message<W: Write>(writer: &mut W, msg: &str, color: bool) -> io::Result<()> {
    if color {
        writeln!(writer, "{} {}", "error:".red().bold(), msg)
    } else {
        writeln!(writer, "error: {msg}")
    }
}

pub fn styled_label(label: RiskLabel, color: bool) -> String {
    let text = label.to_string().to_uppercase();
    if !color {
        return text;
    }
    match label {
        RiskLabel::Low => text.green().bold().to_string(),
        RiskLabel::Medium => text.yellow().bold().to_string(),
        RiskLabel::High => text.red().bold().to_string(),
    }
}

pub fn styled_outcome(outcome: Outcome, color: bool) -> String {
    let text = outcome.to_string();
    match (color, outcome) {
        (false, _) => text,
        (true, Outcome::Allow) => text.green().to_string(),
        (true, Outcome::Block) => text.red().to_string(),
    }
}
