// ticketgate/src/main.rs
//! Ticketgate entry point.
//!
//! Loads `.env`, sets up logging from the global flags and dispatches to the
//! selected subcommand.

use anyhow::Result;
use clap::Parser;
use is_terminal::IsTerminal;
use log::debug;
use std::io;
use std::process::ExitCode;

use ticketgate::cli::{Cli, Commands};
use ticketgate::commands::{rules, scan, serve};
use ticketgate::logger;
use ticketgate::ui::output_format::print_error_message;

async fn dispatch(cli: &Cli) -> Result<ExitCode> {
    match &cli.command {
        Commands::Serve(cmd) => serve::run_serve(cmd).await.map(|_| ExitCode::SUCCESS),
        Commands::Scan(cmd) => scan::run_scan(cmd),
        Commands::Rules(cmd) => rules::run_rules(cmd).map(|_| ExitCode::SUCCESS),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    logger::init_logger(logger::level_from_flags(cli.quiet, cli.debug, cli.disable_debug));
    match dotenv {
        Ok(path) => debug!("Loaded environment from {}.", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => debug!("Ignoring unreadable .env file: {}", e),
    }

    match dispatch(&cli).await {
        Ok(code) => code,
        Err(e) => {
            let color = io::stderr().is_terminal();
            let _ = print_error_message(&mut io::stderr(), &format!("{e:#}"), color);
            ExitCode::FAILURE
        }
    }
}
