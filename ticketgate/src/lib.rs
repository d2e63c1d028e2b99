// ticketgate/src/lib.rs
//! # Ticketgate CLI and daemon
//!
//! This crate wraps `ticketgate-core` in a command-line tool and a local HTTP
//! approval authority, and provides the durable, encrypted file ticket store.

pub mod cli;
pub mod commands;
pub mod logger;
pub mod server;
pub mod settings;
pub mod store;
pub mod ui;

pub use server::{router, spawn, AppState, ServerHandle};
pub use store::{FileStoreError, FileTicketStore};
