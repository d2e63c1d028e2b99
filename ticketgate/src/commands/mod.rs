// ticketgate/src/commands/mod.rs
//! One module per CLI subcommand.

pub mod rules;
pub mod scan;
pub mod serve;
