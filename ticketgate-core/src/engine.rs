// ticketgate-core/src/engine.rs
//! Defines the core `ScanEngine` trait.
//!
//! The `ScanEngine` trait provides a pluggable interface for secret detection.
//! The gateway only depends on this contract, so the regex engine can be swapped
//! for another detector without touching ticket or decision logic.
//!
//! License: MIT OR APACHE 2.0

use std::fmt::Debug;

use crate::config::ScannerConfig;
use crate::patterns::compiler::CompiledRules;

/// A trait that defines the core functionality of a secret scanner.
pub trait ScanEngine: Send + Sync + Debug {
    /// Returns the categories that match `text`.
    ///
    /// The result follows registry order, holds each category at most once and
    /// carries no match counts. Implementations must be pure and deterministic.
    fn scan(&self, text: &str) -> Vec<String>;

    /// Returns a reference to the `CompiledRules` used by the engine.
    fn compiled_rules(&self) -> &CompiledRules;

    /// Returns a reference to the engine's registry configuration.
    fn get_rules(&self) -> &ScannerConfig;
}
