//! risk.rs - Turns scan results and text size into a bounded risk score and label.
//!
//! Any detected secret alone lands in the high band; length only nudges otherwise
//! clean text towards review.
//!
//! License: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::ScanEngine;

pub const BASE_SCORE: u8 = 10;
pub const SECRET_WEIGHT: u8 = 75;
pub const LONG_TEXT_CHARS: usize = 2500;
pub const LONG_TEXT_WEIGHT: u8 = 15;
pub const VERY_LONG_TEXT_CHARS: usize = 5000;
pub const VERY_LONG_TEXT_WEIGHT: u8 = 10;
pub const MAX_SCORE: u8 = 100;

pub const HIGH_THRESHOLD: u8 = 85;
pub const MEDIUM_THRESHOLD: u8 = 50;

/// Coarse risk band derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLabel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLabel::Low => write!(f, "low"),
            RiskLabel::Medium => write!(f, "medium"),
            RiskLabel::High => write!(f, "high"),
        }
    }
}

/// Scores `text` given the categories a scan found in it. Always within `0..=100`.
///
/// Length is measured in characters, not bytes.
pub fn risk_score(text: &str, secrets: &[String]) -> u8 {
    let length = text.chars().count();
    let mut score = BASE_SCORE;
    if !secrets.is_empty() {
        score = score.saturating_add(SECRET_WEIGHT);
    }
    if length > LONG_TEXT_CHARS {
        score = score.saturating_add(LONG_TEXT_WEIGHT);
    }
    if length > VERY_LONG_TEXT_CHARS {
        score = score.saturating_add(VERY_LONG_TEXT_WEIGHT);
    }
    score.min(MAX_SCORE)
}

pub fn risk_label(score: u8) -> RiskLabel {
    if score >= HIGH_THRESHOLD {
        RiskLabel::High
    } else if score >= MEDIUM_THRESHOLD {
        RiskLabel::Medium
    } else {
        RiskLabel::Low
    }
}

/// The result of scanning and scoring one piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u8,
    pub label: RiskLabel,
    pub matched_categories: Vec<String>,
    /// Character count of the assessed text.
    pub length: usize,
}

impl RiskAssessment {
    pub fn evaluate(engine: &dyn ScanEngine, text: &str) -> Self {
        let matched_categories = engine.scan(text);
        let score = risk_score(text, &matched_categories);
        Self {
            score,
            label: risk_label(score),
            matched_categories,
            length: text.chars().count(),
        }
    }

    pub fn has_secrets(&self) -> bool {
        !self.matched_categories.is_empty()
    }
}
