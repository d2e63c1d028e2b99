//! action.rs - The action an agent wants to perform, as handed to `Decide`.
//!
//! `ActionRequest` is the raw, loosely-typed body supplied by the capture side.
//! `ValidatedAction` is what remains after input checks and truncation, and
//! `ActionSnapshot` is the part of it that is stored with a ticket.
//!
//! License: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::decision::Outcome;
use crate::errors::GatewayError;
use crate::risk::{RiskAssessment, RiskLabel};

pub const DEFAULT_PRODUCT: &str = "web";
pub const MAX_HOST_LEN: usize = 253;
pub const MAX_IDENT_LEN: usize = 64;

/// Optional metadata some capture clients send instead of the full text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionMeta {
    pub preview: Option<String>,
    /// Accepted for compatibility but ignored: the length is always counted
    /// from the text actually scanned.
    pub length: Option<usize>,
}

/// An action description submitted for a decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionRequest {
    /// Product or context the action happens in (e.g., "chatgpt"). Defaults to "web".
    pub product: Option<String>,
    /// Host the action originates from. Required.
    pub host: Option<String>,
    /// Kind of action (e.g., "chat.send"). Required.
    pub action: Option<String>,
    /// Text the action would send. Falls back to `meta.preview`, then to empty.
    pub text: Option<String>,
    pub meta: Option<ActionMeta>,
}

impl ActionRequest {
    pub fn new(host: impl Into<String>, action: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            action: Some(action.into()),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Checks required fields, applies safe defaults and caps the text.
    pub fn validate(self, config: &GatewayConfig) -> Result<ValidatedAction, GatewayError> {
        let host = required_field("host", self.host)?;
        if host.chars().count() > MAX_HOST_LEN {
            return Err(GatewayError::InvalidInput(format!(
                "`host` exceeds {MAX_HOST_LEN} characters"
            )));
        }
        if host.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(GatewayError::InvalidInput(
                "`host` must not contain whitespace or control characters".to_string(),
            ));
        }

        let action_kind = required_field("action", self.action)?;
        check_identifier("action", &action_kind)?;

        let product = match self.product.map(|p| p.trim().to_ascii_lowercase()) {
            Some(p) if !p.is_empty() => {
                check_identifier("product", &p)?;
                p
            }
            _ => DEFAULT_PRODUCT.to_string(),
        };

        let raw_text = self
            .text
            .or_else(|| self.meta.and_then(|m| m.preview))
            .unwrap_or_default();
        let original_length = raw_text.chars().count();
        let truncated = original_length > config.max_text_chars;
        let text: String = if truncated {
            raw_text.chars().take(config.max_text_chars).collect()
        } else {
            raw_text
        };
        let preview = text.chars().take(config.preview_chars).collect();

        Ok(ValidatedAction {
            product,
            host: host.to_ascii_lowercase(),
            action_kind,
            text,
            original_length,
            truncated,
            preview,
        })
    }
}

fn required_field(name: &str, value: Option<String>) -> Result<String, GatewayError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(GatewayError::InvalidInput(format!("missing `{name}`"))),
    }
}

fn check_identifier(name: &str, value: &str) -> Result<(), GatewayError> {
    if value.chars().count() > MAX_IDENT_LEN {
        return Err(GatewayError::InvalidInput(format!(
            "`{name}` exceeds {MAX_IDENT_LEN} characters"
        )));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ':');
    if !value.chars().all(allowed) {
        return Err(GatewayError::InvalidInput(format!(
            "`{name}` may only contain letters, digits, '.', '_', '-' and ':'"
        )));
    }
    Ok(())
}

/// An action that passed validation. Lives for one `Decide` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAction {
    pub product: String,
    pub host: String,
    pub action_kind: String,
    /// Text capped at `max_text_chars`; this is what gets scanned and scored.
    pub text: String,
    /// Character count before truncation.
    pub original_length: usize,
    pub truncated: bool,
    pub preview: String,
}

/// What a ticket remembers about the action it guards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSnapshot {
    pub product: String,
    pub host: String,
    pub action: String,
    pub length: usize,
    pub preview: String,
    pub matched_categories: Vec<String>,
    pub risk_score: u8,
    pub risk_label: RiskLabel,
    pub advisory: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
}

impl ActionSnapshot {
    pub fn from_assessment(action: &ValidatedAction, assessment: &RiskAssessment, advisory: Outcome) -> Self {
        Self {
            product: action.product.clone(),
            host: action.host.clone(),
            action: action.action_kind.clone(),
            length: action.original_length,
            preview: action.preview.clone(),
            matched_categories: assessment.matched_categories.clone(),
            risk_score: assessment.score,
            risk_label: assessment.label,
            advisory,
            scenario: None,
        }
    }
}
