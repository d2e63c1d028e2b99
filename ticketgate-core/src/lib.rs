// ticketgate-core/src/lib.rs
//! # Ticketgate Core Library
//!
//! `ticketgate-core` implements the Action Approval Gateway: it decides whether an
//! action an automated agent wants to take on a user's behalf may proceed, and
//! makes a human's answer binding through single-use approval tickets.
//!
//! The library has no I/O of its own beyond loading rule files. Transport (HTTP),
//! durable storage backends and terminal output live in the `ticketgate` crate.
//!
//! ## Modules
//!
//! * `config`: The secret registry (`SecretRule`, `ScannerConfig`) and `GatewayConfig`.
//! * `patterns`: Compilation and caching of registry rules.
//! * `engine` / `engines`: The `ScanEngine` trait and its regex implementation.
//! * `risk`: Score and label computation.
//! * `decision`: Advisory verdicts, human choices and demo scenarios.
//! * `action`: Request validation and the snapshot stored with a ticket.
//! * `tickets`: Ticket records, token minting, the `TicketStore` trait and the memory store.
//! * `events`: Bounded log of recent gateway activity.
//! * `gateway`: `GatewayService`, which ties everything together behind `decide` and `consume`.
//! * `headless`: One-shot assessments without a gateway.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ticketgate_core::{
//!     ActionRequest, Choice, GatewayConfig, GatewayService, MemoryTicketStore, Outcome, RegexEngine,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = Arc::new(RegexEngine::with_default_rules()?);
//!     let store = Arc::new(MemoryTicketStore::new());
//!     let gateway = GatewayService::new(GatewayConfig::default(), engine, Some(store))?;
//!
//!     let response = gateway
//!         .decide(ActionRequest::new("chat.example.com", "chat.send", "please summarize this PDF"))
//!         .await?;
//!     let ticket = response.ticket.expect("low-risk actions receive a ticket");
//!
//!     let decision = gateway.consume(&ticket, Choice::Allow).await?;
//!     assert_eq!(decision.outcome, Outcome::Allow);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Gateway operations return [`GatewayError`]. Every variant maps to a BLOCK
//! reason via [`GatewayError::block_reason`]; rule loading uses `anyhow`.
//!
//! ---
//! License: MIT OR APACHE 2.0

pub mod action;
pub mod config;
pub mod decision;
pub mod engine;
pub mod engines;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod headless;
pub mod patterns;
pub mod redaction;
pub mod risk;
pub mod tickets;

/// Registry and gateway configuration.
pub use config::{
    merge_rules, EnforcementMode, GatewayConfig, ScannerConfig, SecretRule, DEFAULT_TICKET_TTL_SECS,
    MAX_PATTERN_LENGTH,
};

pub use errors::GatewayError;

pub use engine::ScanEngine;
pub use engines::regex_engine::RegexEngine;
pub use patterns::compiler::{compile_rules, get_or_compile_rules, CompiledRule, CompiledRules};

pub use risk::{risk_label, risk_score, RiskAssessment, RiskLabel};
pub use decision::{evaluate_risk, resolve_scenario, Choice, Decision, Outcome, Scenario, Verdict, SCENARIOS};
pub use action::{ActionMeta, ActionRequest, ActionSnapshot, ValidatedAction};

pub use tickets::{
    generate_token, token_fingerprint, Clock, ManualClock, MemoryTicketStore, SystemClock, TicketRecord,
    TicketStore,
};
pub use events::{EventKind, EventLog, GatewayEvent};
pub use gateway::{DecideResponse, GatewayService, ScenarioResponse};

pub use headless::{headless_assess, headless_scan};
pub use redaction::redact_sensitive;
