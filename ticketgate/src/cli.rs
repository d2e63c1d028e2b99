// ticketgate/src/cli.rs
//! This file defines the command-line interface (CLI) for the ticketgate application,
//! including all available commands and their arguments.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(
    name = "ticketgate",
    version = env!("CARGO_PKG_VERSION"),
    about = "Local approval authority for actions agents take on your behalf",
    long_about = "Ticketgate scans the text an automated agent is about to send, scores its risk, and issues single-use approval tickets. A human's ALLOW or DENY only takes effect when the ticket is consumed, and a ticket can be consumed exactly once.",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Disable informational messages
    #[arg(long, short = 'q', global = true, help = "Only log errors.")]
    pub quiet: bool,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(long, short = 'd', global = true, help = "Enable debug logging.")]
    pub debug: bool,

    /// Explicitly disable debug logging, even if RUST_LOG is set to DEBUG
    #[arg(long = "disable-debug", global = true, help = "Disable debug logging, overriding RUST_LOG.")]
    pub disable_debug: bool,

    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// All available commands for the `ticketgate` CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs the local HTTP approval authority.
    #[command(about = "Runs the local HTTP approval authority.")]
    Serve(ServeCommand),

    /// Scores a file or stdin without issuing any ticket.
    #[command(about = "Scans a file or stdin for secrets and prints its risk assessment.")]
    Scan(ScanCommand),

    /// Lists the active secret registry.
    #[command(about = "Lists the secret rules that would be used for scanning.")]
    Rules(RulesCommand),
}

/// Where issued tickets are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// In-process memory; tickets are lost on restart.
    Memory,
    /// Encrypted file; tickets survive restarts.
    File,
    /// No storage: tickets are not enforced and every response says so.
    Disabled,
}

/// Rule-selection flags shared by every command that builds a scanner.
#[derive(Args, Debug, Clone, Default)]
pub struct RuleArgs {
    /// Path to a YAML file with additional or overriding secret rules.
    #[arg(long = "rules-file", value_name = "FILE", env = "TICKETGATE_RULES_FILE", help = "YAML file with extra or overriding secret rules.")]
    pub rules_file: Option<PathBuf>,

    /// Enable these opt-in rule names (comma-separated).
    #[arg(long, short = 'e', value_delimiter = ',', help = "Enable these opt-in rule names (comma-separated).")]
    pub enable: Vec<String>,

    /// Disable these rule names (comma-separated).
    #[arg(long, short = 'x', value_delimiter = ',', help = "Disable these rule names (comma-separated).")]
    pub disable: Vec<String>,
}

/// Arguments for the `serve` command. Flags override the settings file.
#[derive(Parser, Debug)]
pub struct ServeCommand {
    /// Path to the daemon settings file (YAML).
    #[arg(long = "config", value_name = "FILE", env = "TICKETGATE_CONFIG", help = "Daemon settings file (YAML).")]
    pub config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, value_name = "ADDR", env = "TICKETGATE_BIND", help = "Address to listen on (default 127.0.0.1:8788).")]
    pub bind: Option<String>,

    /// Ticket storage backend.
    #[arg(long, value_enum, env = "TICKETGATE_STORE", help = "Ticket storage backend.")]
    pub store: Option<StoreKind>,

    /// Location of the encrypted ticket file for `--store file`.
    #[arg(long = "store-path", value_name = "FILE", env = "TICKETGATE_STORE_PATH", help = "Ticket file used by the file store.")]
    pub store_path: Option<PathBuf>,

    /// Ticket lifetime in seconds.
    #[arg(long = "ttl", value_name = "SECS", env = "TICKETGATE_TICKET_TTL", help = "Lifetime of an unconsumed ticket, in seconds.")]
    pub ttl: Option<u64>,

    /// Seconds between sweeps of expired tickets (0 disables the sweeper).
    #[arg(long = "sweep-interval", value_name = "SECS", env = "TICKETGATE_SWEEP_INTERVAL", help = "Seconds between expired-ticket sweeps; 0 disables.")]
    pub sweep_interval: Option<u64>,

    #[command(flatten)]
    pub rules: RuleArgs,
}

/// Arguments for the `scan` command.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Path to an input file (reads from stdin if not provided).
    #[arg(long, short = 'i', value_name = "FILE", help = "Read input from a specified file instead of stdin.")]
    pub input_file: Option<PathBuf>,

    #[command(flatten)]
    pub rules: RuleArgs,

    /// Print the assessment as JSON.
    #[arg(long, help = "Print the assessment as JSON.")]
    pub json: bool,

    /// Exit with a non-zero status if the input is high risk.
    #[arg(long = "fail-on-high", help = "Exit with status 2 when the input is high risk.")]
    pub fail_on_high: bool,
}

/// Arguments for the `rules` command.
#[derive(Parser, Debug)]
pub struct RulesCommand {
    #[command(flatten)]
    pub rules: RuleArgs,

    /// Print the rules as JSON.
    #[arg(long, help = "Print the rules as JSON.")]
    pub json: bool,
}
