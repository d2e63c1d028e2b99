//! errors.rs - Custom error types for the ticketgate-core library.
//!
//! This module defines a structured error enum for the library, providing
//! specific, actionable error types that can be handled programmatically.
//! Every variant that can reach a caller of `Decide` or `Consume` also maps
//! to a BLOCK reason, so failures are always surfaced as a denial.
//!
//! License: MIT OR APACHE 2.0

use thiserror::Error;

/// This enum represents all possible error types in the `ticketgate-core` library.
///
/// `#[non_exhaustive]` lets new failure modes be added without breaking
/// downstream matches.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("Failed to compile secret rule '{0}': {1}")]
    RuleCompilationError(String, regex::Error),

    #[error("Rule '{0}': pattern length ({1}) exceeds maximum allowed ({2})")]
    PatternLengthExceeded(String, usize, usize),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Ticket storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Expired or unknown approval token.")]
    NotFound,

    #[error("Approval token expired.")]
    Expired,

    #[error("Already approved once (replay blocked).")]
    AlreadyConsumed,

    /// Raised by a store when asked to insert a token it already holds.
    #[error("Ticket token already exists in the store.")]
    DuplicateToken,

    #[error("A fatal error occurred: {0}")]
    Fatal(String),
}

impl GatewayError {
    /// Stable, machine-readable identifier for the error.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::RuleCompilationError(..) => "rule_compilation",
            GatewayError::PatternLengthExceeded(..) => "pattern_length",
            GatewayError::InvalidInput(_) => "invalid_input",
            GatewayError::StorageUnavailable(_) => "storage_unavailable",
            GatewayError::NotFound => "not_found",
            GatewayError::Expired => "expired",
            GatewayError::AlreadyConsumed => "already_consumed",
            GatewayError::DuplicateToken => "duplicate_token",
            GatewayError::Fatal(_) => "fatal",
        }
    }

    /// Human-readable reason shown alongside the BLOCK this error turns into.
    ///
    /// Storage and internal details are kept out of the reason; they are logged instead.
    pub fn block_reason(&self) -> String {
        match self {
            GatewayError::InvalidInput(msg) => format!("Blocked: invalid request ({msg})."),
            GatewayError::StorageUnavailable(_) => {
                "Blocked: ticket storage is unavailable, so this approval cannot be enforced.".to_string()
            }
            GatewayError::NotFound | GatewayError::Expired | GatewayError::AlreadyConsumed => self.to_string(),
            _ => "Blocked: the gateway could not evaluate this action.".to_string(),
        }
    }

    /// True for the non-fatal outcomes of consuming a ticket that cannot be honoured.
    pub fn is_ticket_rejection(&self) -> bool {
        matches!(
            self,
            GatewayError::NotFound | GatewayError::Expired | GatewayError::AlreadyConsumed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_rejections_are_distinguishable() {
        let reasons = [
            GatewayError::NotFound.block_reason(),
            GatewayError::Expired.block_reason(),
            GatewayError::AlreadyConsumed.block_reason(),
        ];
        assert_ne!(reasons[0], reasons[1]);
        assert_ne!(reasons[1], reasons[2]);
        assert!(reasons[2].contains("replay"));
    }

    #[test]
    fn storage_reason_hides_backend_detail() {
        let err = GatewayError::StorageUnavailable("disk full at /var/lib/x".to_string());
        assert!(!err.block_reason().contains("/var/lib/x"));
        assert_eq!(err.code(), "storage_unavailable");
        assert!(!err.is_ticket_rejection());
    }
}
