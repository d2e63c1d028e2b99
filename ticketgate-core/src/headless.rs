// ticketgate-core/src/headless.rs
//! Convenience wrappers for one-shot, non-interactive assessments.
//!
//! These helpers build a scan engine from a registry and score a single piece
//! of text without a gateway, a store or any tickets. The `ticketgate scan`
//! command is built on them.

use anyhow::Result;

use crate::config::ScannerConfig;
use crate::engine::ScanEngine;
use crate::engines::regex_engine::RegexEngine;
use crate::risk::RiskAssessment;

/// Scans and scores `content` against `config`.
///
/// # Arguments
///
/// * `config` - The merged registry (defaults plus optional user rules).
/// * `content` - The text to assess. It is not truncated here.
pub fn headless_assess(config: ScannerConfig, content: &str) -> Result<RiskAssessment> {
    let engine = RegexEngine::new(config)?;
    Ok(RiskAssessment::evaluate(&engine as &dyn ScanEngine, content))
}

/// Returns only the categories found in `content`, in registry order.
pub fn headless_scan(config: ScannerConfig, content: &str) -> Result<Vec<String>> {
    let engine = RegexEngine::new(config)?;
    Ok(engine.scan(content))
}
