// ticketgate-core/src/redaction.rs
//! Helpers that keep action text out of logs.
//!
//! Text only reaches a log line verbatim when `TICKETGATE_ALLOW_DEBUG_TEXT=true`
//! is set in the environment of the process.

use lazy_static::lazy_static;
use log::debug;

lazy_static! {
    static ref TEXT_DEBUG_ALLOWED: bool = {
        std::env::var("TICKETGATE_ALLOW_DEBUG_TEXT")
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    };
}

/// Replaces `s` with a placeholder that only reveals its size in characters.
pub fn redact_sensitive(s: &str) -> String {
    const MAX_LEN: usize = 8;
    let chars = s.chars().count();
    if chars <= MAX_LEN {
        "[REDACTED]".to_string()
    } else {
        format!("[REDACTED: {chars} chars]")
    }
}

pub fn loggable_text(text: &str) -> String {
    if *TEXT_DEBUG_ALLOWED {
        text.to_string()
    } else {
        redact_sensitive(text)
    }
}

/// Debug-logs the text an assessment was computed over, redacted unless allowed.
pub fn log_assessed_text(module_path: &str, host: &str, action: &str, text: &str) {
    debug!(
        "[{}] Assessing '{}' on '{}': {}",
        module_path,
        action,
        host,
        loggable_text(text)
    );
}
