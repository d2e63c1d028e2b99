//! compiler.rs - Manages the compilation and caching of secret rules.
//!
//! This module converts a `ScannerConfig` into `CompiledRules`, keeping the
//! registry order intact. Compiled sets are shared through a global cache keyed by
//! a hash of the config, so every gateway built from the same registry reuses one
//! set of regexes.
//!
//! License: MIT OR APACHE 2.0

use anyhow::Result;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::{Regex, RegexBuilder};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use crate::config::{ScannerConfig, SecretRule, MAX_PATTERN_LENGTH};
use crate::errors::GatewayError;

/// A single compiled secret rule.
#[derive(Debug)]
pub struct CompiledRule {
    /// The compiled regular expression used for matching.
    pub regex: Regex,
    /// The category reported when the rule matches.
    pub name: String,
    pub description: Option<String>,
}

/// All compiled rules, in registry order.
#[derive(Debug)]
pub struct CompiledRules {
    pub rules: Vec<CompiledRule>,
}

impl CompiledRules {
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

lazy_static! {
    /// Process-wide cache for compiled rule sets, keyed by `hash_config`.
    static ref COMPILED_RULES_CACHE: RwLock<HashMap<u64, Arc<CompiledRules>>> = RwLock::new(HashMap::new());
}

/// Order matters for scan output, so the rules are hashed as-is rather than sorted.
fn hash_config(config: &ScannerConfig) -> u64 {
    let mut hasher = DefaultHasher::new();
    config.hash(&mut hasher);
    hasher.finish()
}

/// Compiles a list of `SecretRule`s into `CompiledRules`.
///
/// Rules explicitly disabled with `enabled: false` are skipped. Any invalid rule
/// fails the whole compilation so a broken registry is never half-applied.
pub fn compile_rules(rules_to_compile: Vec<SecretRule>) -> Result<CompiledRules, GatewayError> {
    debug!("Starting compilation of {} rules.", rules_to_compile.len());

    let mut compiled_rules = Vec::new();
    let mut compilation_errors = Vec::new();

    for rule in rules_to_compile {
        if rule.enabled == Some(false) {
            debug!("Skipping disabled rule '{}'.", &rule.name);
            continue;
        }

        let Some(pattern) = rule.pattern.as_ref() else {
            warn!("Skipping rule '{}' because its pattern is missing.", &rule.name);
            continue;
        };

        if pattern.len() > MAX_PATTERN_LENGTH {
            compilation_errors.push(GatewayError::PatternLengthExceeded(
                rule.name,
                pattern.len(),
                MAX_PATTERN_LENGTH,
            ));
            continue;
        }

        let regex_result = RegexBuilder::new(pattern)
            .case_insensitive(rule.case_insensitive)
            .multi_line(rule.multiline)
            .dot_matches_new_line(rule.dot_matches_new_line)
            .size_limit(10 * (1 << 20))
            .build();

        match regex_result {
            Ok(regex) => {
                log::debug!(
                    target: "ticketgate_core::patterns",
                    "Rule '{}' compiled successfully.",
                    &rule.name
                );
                compiled_rules.push(CompiledRule {
                    regex,
                    name: rule.name,
                    description: rule.description,
                });
            }
            Err(e) => compilation_errors.push(GatewayError::RuleCompilationError(rule.name, e)),
        }
    }

    if !compilation_errors.is_empty() {
        let error_message = compilation_errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<String>>()
            .join("\n");
        Err(GatewayError::Fatal(format!(
            "Failed to compile {} rule(s):\n{}",
            compilation_errors.len(),
            error_message
        )))
    } else {
        debug!("Finished compiling rules. Total compiled: {}.", compiled_rules.len());
        Ok(CompiledRules { rules: compiled_rules })
    }
}

/// Gets a `CompiledRules` instance from the cache or compiles it if not found.
///
/// A poisoned cache lock only disables caching; it never prevents compilation.
pub fn get_or_compile_rules(config: &ScannerConfig) -> Result<Arc<CompiledRules>> {
    let cache_key = hash_config(config);

    match COMPILED_RULES_CACHE.read() {
        Ok(cache) => {
            if let Some(rules) = cache.get(&cache_key) {
                debug!("Serving compiled rules from cache for key: {}", &cache_key);
                return Ok(Arc::clone(rules));
            }
        }
        Err(_) => warn!("Compiled rules cache lock is poisoned; compiling without cache."),
    }

    debug!("Compiled rules not found in cache. Compiling now.");
    let compiled_arc = Arc::new(compile_rules(config.rules.clone())?);

    if let Ok(mut cache) = COMPILED_RULES_CACHE.write() {
        cache.insert(cache_key, Arc::clone(&compiled_arc));
        debug!("Successfully compiled and cached rules for key: {}", &cache_key);
    }

    Ok(compiled_arc)
}
