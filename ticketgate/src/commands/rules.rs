// ticketgate/src/commands/rules.rs
//! `ticketgate rules`: prints the active secret registry in scan order.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{self, Write};

use crate::cli::RulesCommand;
use crate::settings::load_scanner_config;
use crate::ui::report::rules_table;

#[derive(Serialize)]
struct RuleListing<'a> {
    name: &'a str,
    description: Option<&'a str>,
    pattern: Option<&'a str>,
}

pub fn run_rules(cmd: &RulesCommand) -> Result<()> {
    let config = load_scanner_config(&cmd.rules)?;
    let mut stdout = io::stdout().lock();

    if cmd.json {
        let listing: Vec<RuleListing<'_>> = config
            .rules
            .iter()
            .filter(|r| r.enabled != Some(false))
            .map(|r| RuleListing {
                name: &r.name,
                description: r.description.as_deref(),
                pattern: r.pattern.as_deref(),
            })
            .collect();
        serde_json::to_writer_pretty(&mut stdout, &listing).context("Failed to write JSON")?;
        writeln!(stdout)?;
    } else {
        writeln!(stdout, "{}", rules_table(&config))?;
    }
    stdout.flush()?;
    Ok(())
}
