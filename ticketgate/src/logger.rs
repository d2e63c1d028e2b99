// ticketgate/src/logger.rs
//! Logger setup for the `ticketgate` binary.
//!
//! `RUST_LOG` is honoured unless a command-line flag forces a level. Logs go to
//! stderr so `scan --json` output on stdout stays machine-readable.

use env_logger::{Builder, Env, Target};
use log::LevelFilter;

const DEFAULT_FILTER: &str = "info";

/// Maps the global CLI flags to a forced level, if any.
///
/// `--quiet` wins over `--disable-debug`, which wins over `--debug`.
pub fn level_from_flags(quiet: bool, debug: bool, disable_debug: bool) -> Option<LevelFilter> {
    if quiet {
        Some(LevelFilter::Error)
    } else if disable_debug {
        Some(LevelFilter::Info)
    } else if debug {
        Some(LevelFilter::Debug)
    } else {
        None
    }
}

/// Initializes the global logger. Safe to call more than once; later calls are ignored.
pub fn init_logger(level_override: Option<LevelFilter>) {
    let mut builder = Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER));
    if let Some(level) = level_override {
        builder.filter_level(level);
    }
    builder.format_timestamp_millis().target(Target::Stderr);
    if builder.try_init().is_err() {
        log::debug!("Logger already initialized; keeping the existing one.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_beats_debug() {
        assert_eq!(level_from_flags(true, true, false), Some(LevelFilter::Error));
        assert_eq!(level_from_flags(false, true, true), Some(LevelFilter::Info));
        assert_eq!(level_from_flags(false, true, false), Some(LevelFilter::Debug));
        assert_eq!(level_from_flags(false, false, false), None);
    }
}
