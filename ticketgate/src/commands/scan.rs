// ticketgate/src/commands/scan.rs
//! `ticketgate scan`: offline risk assessment of a file or stdin.

use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use log::{debug, info};
use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;

use ticketgate_core::redaction::loggable_text;
use ticketgate_core::{headless_assess, RiskLabel};

use crate::cli::ScanCommand;
use crate::settings::load_scanner_config;
use crate::ui::report::assessment_table;

/// Exit status used by `--fail-on-high` when the input is high risk.
pub const HIGH_RISK_EXIT: u8 = 2;

fn read_input(cmd: &ScanCommand) -> Result<String> {
    match &cmd.input_file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            Ok(buffer)
        }
    }
}

pub fn run_scan(cmd: &ScanCommand) -> Result<ExitCode> {
    let config = load_scanner_config(&cmd.rules)?;
    let input = read_input(cmd)?;
    debug!("Scanning input: {}", loggable_text(&input));

    let assessment = headless_assess(config, &input).context("Scan failed")?;
    info!(
        "Scan finished: {} ({}), {} categories.",
        assessment.label,
        assessment.score,
        assessment.matched_categories.len()
    );

    let mut stdout = io::stdout().lock();
    if cmd.json {
        serde_json::to_writer_pretty(&mut stdout, &assessment).context("Failed to write JSON")?;
        writeln!(stdout)?;
    } else {
        let color = io::stdout().is_terminal();
        writeln!(stdout, "{}", assessment_table(&assessment, color))?;
    }
    stdout.flush()?;

    if cmd.fail_on_high && assessment.label == RiskLabel::High {
        return Ok(ExitCode::from(HIGH_RISK_EXIT));
    }
    Ok(ExitCode::SUCCESS)
}
