// ticketgate-core/src/engines/regex_engine.rs
//! A `ScanEngine` implementation that runs each registry rule as an independent
//! regular expression against the action text.
//! License: MIT OR APACHE 2.0

use anyhow::{Context, Result};
use log::debug;
use std::borrow::Cow;
use std::sync::Arc;
use strip_ansi_escapes::strip;

use crate::config::ScannerConfig;
use crate::engine::ScanEngine;
use crate::patterns::compiler::{get_or_compile_rules, CompiledRules};

#[derive(Debug)]
pub struct RegexEngine {
    compiled_rules: Arc<CompiledRules>,
    config: ScannerConfig,
}

impl RegexEngine {
    pub fn new(config: ScannerConfig) -> Result<Self> {
        let compiled_rules =
            get_or_compile_rules(&config).context("Failed to compile secret rules for RegexEngine")?;

        Ok(Self { compiled_rules, config })
    }

    /// Builds an engine over the embedded default registry.
    pub fn with_default_rules() -> Result<Self> {
        Self::new(ScannerConfig::load_default_rules()?)
    }
}

/// Terminal escape sequences are removed so colouring cannot split a secret.
fn scannable_text(text: &str) -> Cow<'_, str> {
    if !text.contains('\u{1b}') {
        return Cow::Borrowed(text);
    }
    let stripped = strip(text.as_bytes());
    Cow::Owned(String::from_utf8_lossy(&stripped).into_owned())
}

impl ScanEngine for RegexEngine {
    fn scan(&self, text: &str) -> Vec<String> {
        let input = scannable_text(text);
        let mut found: Vec<String> = Vec::new();

        for compiled_rule in &self.compiled_rules.rules {
            if found.iter().any(|name| name == &compiled_rule.name) {
                continue;
            }
            if compiled_rule.regex.is_match(&input) {
                debug!("Rule '{}' matched.", compiled_rule.name);
                found.push(compiled_rule.name.clone());
            }
        }
        found
    }

    fn compiled_rules(&self) -> &CompiledRules {
        &self.compiled_rules
    }

    fn get_rules(&self) -> &ScannerConfig {
        &self.config
    }
}
