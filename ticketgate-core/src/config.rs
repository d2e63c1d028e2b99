//! Configuration management for `ticketgate-core`.
//!
//! This module defines the secret registry (`SecretRule`, `ScannerConfig`) and the
//! gateway's runtime settings (`GatewayConfig`). It handles YAML deserialization and
//! provides utilities for loading, merging, filtering and validating the registry.
//!
//! License: MIT OR Apache-2.0

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Maximum allowed length for a regex pattern string.
pub const MAX_PATTERN_LENGTH: usize = 500;

/// Default lifetime of an unconsumed ticket (five minutes).
pub const DEFAULT_TICKET_TTL_SECS: u64 = 5 * 60;

/// Upper bound accepted for any ticket lifetime setting (one week).
pub const MAX_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// A single entry of the secret registry.
///
/// The `name` is the category reported by a scan when `pattern` matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(default)]
pub struct SecretRule {
    /// Category name reported on a match (e.g., "AWS Key").
    pub name: String,
    /// Human-readable description of what the rule targets.
    pub description: Option<String>,
    /// The regex pattern string.
    pub pattern: Option<String>,
    /// If true, the pattern is matched case-insensitively.
    pub case_insensitive: bool,
    /// If true, enables multiline mode for the regex engine.
    pub multiline: bool,
    /// If true, the dot character `.` in regex will match newlines.
    pub dot_matches_new_line: bool,
    /// If true, the rule is disabled unless explicitly enabled.
    pub opt_in: bool,
    /// Explicit override for enabling/disabling the rule.
    pub enabled: Option<bool>,
    /// Metadata tags for categorization.
    pub tags: Option<Vec<String>>,
}

/// The ordered secret registry.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq, Hash)]
pub struct ScannerConfig {
    /// Rules in registry order.
    pub rules: Vec<SecretRule>,
}

impl ScannerConfig {
    /// Loads secret rules from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading custom rules from: {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file {}", path.display()))?;
        let config: ScannerConfig = serde_yml::from_str(&text)
            .with_context(|| format!("Failed to parse rules file {}", path.display()))?;

        validate_rules(&config.rules)?;
        info!("Loaded {} rules from file {}.", config.rules.len(), path.display());

        Ok(config)
    }

    /// Loads the built-in registry from the embedded configuration.
    pub fn load_default_rules() -> Result<Self> {
        debug!("Loading default rules from embedded string...");
        let default_yaml = include_str!("../config/default_rules.yaml");
        let config: ScannerConfig =
            serde_yml::from_str(default_yaml).context("Failed to parse default rules")?;

        debug!("Loaded {} default rules.", config.rules.len());
        Ok(config)
    }

    /// Filters active rules based on enable/disable lists.
    ///
    /// Opt-in rules stay only when named in `enable_rules`; anything named in
    /// `disable_rules` is removed. Registry order is preserved.
    pub fn set_active_rules(&mut self, enable_rules: &[String], disable_rules: &[String]) {
        let enable_set: HashSet<&str> = enable_rules.iter().map(String::as_str).collect();
        let disable_set: HashSet<&str> = disable_rules.iter().map(String::as_str).collect();

        debug!("Initial rules count before filtering: {}", self.rules.len());

        let all_rule_names: HashSet<&str> = self.rules.iter().map(|r| r.name.as_str()).collect();

        for rule_name in enable_set.difference(&all_rule_names) {
            warn!("Rule '{}' in `enable_rules` list does not exist.", rule_name);
        }

        for rule_name in disable_set.difference(&all_rule_names) {
            warn!("Rule '{}' in `disable_rules` list does not exist.", rule_name);
        }

        self.rules.retain(|rule| {
            let rule_name_str = rule.name.as_str();
            !disable_set.contains(rule_name_str) && (!rule.opt_in || enable_set.contains(rule_name_str))
        });

        debug!("Final active rules count after filtering: {}", self.rules.len());
    }

    /// Category names of all rules that will take part in a scan, in registry order.
    pub fn active_rule_names(&self) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|r| r.enabled != Some(false))
            .map(|r| r.name.as_str())
            .collect()
    }
}

/// Merges user-defined rules with the defaults.
///
/// A user rule with the same name replaces the default in place; new user rules
/// are appended after the defaults, so registry order stays deterministic.
pub fn merge_rules(default_config: ScannerConfig, user_config: Option<ScannerConfig>) -> ScannerConfig {
    debug!("merge_rules called. Initial default rules count: {}", default_config.rules.len());

    let mut final_rules = default_config.rules;

    if let Some(user_cfg) = user_config {
        debug!("User config provided. Merging {} user rules.", user_cfg.rules.len());
        for user_rule in user_cfg.rules {
            match final_rules.iter_mut().find(|r| r.name == user_rule.name) {
                Some(existing) => *existing = user_rule,
                None => final_rules.push(user_rule),
            }
        }
    }

    debug!("Final total rules after merge: {}", final_rules.len());
    ScannerConfig { rules: final_rules }
}

/// Validates rule integrity (names, pattern presence, length, regex compilation).
fn validate_rules(rules: &[SecretRule]) -> Result<()> {
    let mut rule_names = HashSet::new();
    let mut errors = Vec::new();

    for rule in rules {
        if rule.name.trim().is_empty() {
            errors.push("A rule has an empty `name` field.".to_string());
        } else if !rule_names.insert(rule.name.clone()) {
            errors.push(format!("Duplicate rule name found: '{}'.", rule.name));
        }

        let pattern = match &rule.pattern {
            Some(p) => p,
            None => {
                errors.push(format!("Rule '{}' is missing the `pattern` field.", rule.name));
                continue;
            }
        };

        if pattern.is_empty() {
            errors.push(format!("Rule '{}' has an empty `pattern` field.", rule.name));
            continue;
        }

        if pattern.len() > MAX_PATTERN_LENGTH {
            errors.push(format!(
                "Rule '{}': pattern length ({}) exceeds maximum allowed ({}).",
                rule.name,
                pattern.len(),
                MAX_PATTERN_LENGTH
            ));
            continue;
        }

        if let Err(e) = Regex::new(pattern) {
            errors.push(format!("Rule '{}' has an invalid regex pattern: {}", rule.name, e));
        }
    }

    if !errors.is_empty() {
        let full_error_message = format!("Rule validation failed:\n{}", errors.join("\n"));
        Err(anyhow!(full_error_message))
    } else {
        Ok(())
    }
}

/// Whether consumed tickets are enforced against a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    /// Tickets are persisted and consumed exactly once.
    #[default]
    Enforcing,
    /// Persistence is switched off; every response says enforcement is disabled.
    Disabled,
}

/// Runtime settings for the gateway, fixed when the service is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Lifetime of an unconsumed ticket, in seconds.
    pub ticket_ttl_secs: u64,
    /// How long a consumed ticket is kept so replays report `AlreadyConsumed`.
    pub consumed_retention_secs: u64,
    /// Characters of action text that are scanned and scored; the rest is dropped.
    pub max_text_chars: usize,
    /// Characters of action text kept as the preview.
    pub preview_chars: usize,
    /// Capacity of the in-memory event log.
    pub max_events: usize,
    pub enforcement: EnforcementMode,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ticket_ttl_secs: DEFAULT_TICKET_TTL_SECS,
            consumed_retention_secs: DEFAULT_TICKET_TTL_SECS,
            max_text_chars: 6000,
            preview_chars: 200,
            max_events: 200,
            enforcement: EnforcementMode::Enforcing,
        }
    }
}

impl GatewayConfig {
    /// Checks that all settings are within usable bounds.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.ticket_ttl_secs == 0 || self.ticket_ttl_secs > MAX_TTL_SECS {
            errors.push(format!("`ticket_ttl_secs` must be between 1 and {MAX_TTL_SECS}."));
        }
        if self.consumed_retention_secs > MAX_TTL_SECS {
            errors.push(format!("`consumed_retention_secs` must not exceed {MAX_TTL_SECS}."));
        }
        if self.max_text_chars == 0 {
            errors.push("`max_text_chars` must be greater than 0.".to_string());
        }
        if self.max_events == 0 {
            errors.push("`max_events` must be greater than 0.".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("Gateway configuration is invalid:\n{}", errors.join("\n")))
        }
    }

    pub fn is_enforcing(&self) -> bool {
        self.enforcement == EnforcementMode::Enforcing
    }

    pub fn ticket_ttl(&self) -> Duration {
        secs_to_duration(self.ticket_ttl_secs)
    }

    pub fn consumed_retention(&self) -> Duration {
        secs_to_duration(self.consumed_retention_secs)
    }
}

fn secs_to_duration(secs: u64) -> Duration {
    i64::try_from(secs.min(MAX_TTL_SECS))
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or_else(Duration::zero)
}
