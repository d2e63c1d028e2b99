//! gateway.rs - The approval gateway: `Decide` and `Consume`.
//!
//! `GatewayService` scans and scores an action, attaches an advisory verdict,
//! and mints a single-use ticket for actions a human may approve. The human's
//! answer is made binding by consuming that ticket exactly once.
//!
//! Every failure on either path ends in a BLOCK. Callers that only need the
//! final `Decision` can turn any `GatewayError` into one with
//! [`GatewayError::block_reason`].
//!
//! License: MIT OR APACHE 2.0

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::action::{ActionRequest, ActionSnapshot};
use crate::config::GatewayConfig;
use crate::decision::{evaluate_risk, resolve_scenario, Choice, Decision, Outcome};
use crate::engine::ScanEngine;
use crate::errors::GatewayError;
use crate::events::{EventKind, EventLog};
use crate::redaction::log_assessed_text;
use crate::risk::{RiskAssessment, RiskLabel};
use crate::tickets::{
    generate_token, is_well_formed_token, token_fingerprint, Clock, SystemClock, TicketRecord, TicketStore,
};

/// Attempts at minting a token that the store has not seen before.
const MAX_ISSUE_ATTEMPTS: usize = 3;

const DISABLED_NOTICE: &str = "Enforcement is disabled: tickets are not stored and approvals are not enforced.";

/// Result of `Decide`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecideResponse {
    pub decision: Outcome,
    pub reason: String,
    pub risk_label: RiskLabel,
    pub risk_score: u8,
    pub matched_categories: Vec<String>,
    /// Character count of the submitted text, before truncation.
    pub length: usize,
    pub preview: String,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<i64>,
    pub enforced: bool,
}

/// Result of running one of the fixed demo scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioResponse {
    pub scenario: String,
    pub want: String,
    pub decision: Outcome,
    pub why: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<i64>,
    pub enforced: bool,
}

struct IssuedTicket {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct GatewayService {
    config: GatewayConfig,
    engine: Arc<dyn ScanEngine>,
    store: Option<Arc<dyn TicketStore>>,
    clock: Arc<dyn Clock>,
    events: Arc<EventLog>,
}

impl GatewayService {
    /// Builds a gateway. An enforcing configuration requires a store.
    pub fn new(
        config: GatewayConfig,
        engine: Arc<dyn ScanEngine>,
        store: Option<Arc<dyn TicketStore>>,
    ) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::InvalidInput(e.to_string()))?;
        if config.is_enforcing() && store.is_none() {
            return Err(GatewayError::StorageUnavailable(
                "enforcing mode requires a ticket store".to_string(),
            ));
        }
        if !config.is_enforcing() {
            warn!("{}", DISABLED_NOTICE);
        }
        let events = Arc::new(EventLog::new(config.max_events));
        Ok(Self {
            config,
            engine,
            store,
            clock: Arc::new(SystemClock),
            events,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// True when tickets are stored and consumption is enforced.
    pub fn is_enforcing(&self) -> bool {
        self.config.is_enforcing() && self.store.is_some()
    }

    /// True when enforced tickets survive a restart of the process.
    pub fn is_durable(&self) -> bool {
        match &self.store {
            Some(store) if self.config.is_enforcing() => store.is_durable(),
            _ => false,
        }
    }

    pub fn store_name(&self) -> &'static str {
        match &self.store {
            Some(store) if self.config.is_enforcing() => store.name(),
            _ => "disabled",
        }
    }

    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    pub fn engine(&self) -> &Arc<dyn ScanEngine> {
        &self.engine
    }

    /// Scans and scores `text` without issuing anything.
    pub fn assess(&self, text: &str) -> RiskAssessment {
        RiskAssessment::evaluate(self.engine.as_ref(), text)
    }

    /// Evaluates an action and, when it may be approved, issues a ticket for it.
    ///
    /// Invalid input is rejected before scanning. A storage failure while issuing
    /// is returned as an error and never as an ALLOW.
    pub async fn decide(&self, request: ActionRequest) -> Result<DecideResponse, GatewayError> {
        let action = request.validate(&self.config)?;
        log_assessed_text(module_path!(), &action.host, &action.action_kind, &action.text);

        let assessment = self.assess(&action.text);
        let verdict = evaluate_risk(&assessment);
        let snapshot = ActionSnapshot::from_assessment(&action, &assessment, verdict.outcome);

        let issued = if verdict.ticket_eligible {
            match self.issue(snapshot).await {
                Ok(issued) => Some(issued),
                Err(e) => {
                    error!(
                        "Failed to issue ticket for '{}' on '{}': {}",
                        action.action_kind, action.host, e
                    );
                    self.events.record(
                        EventKind::Decide,
                        json!({
                            "product": action.product,
                            "host": action.host,
                            "action": action.action_kind,
                            "risk_label": assessment.label,
                            "risk_score": assessment.score,
                            "categories": assessment.matched_categories,
                            "decision": Outcome::Block,
                            "error": e.code(),
                        }),
                    );
                    return Err(e);
                }
            }
        } else {
            None
        };

        let mut reason = verdict.reason;
        if !self.is_enforcing() {
            reason = format!("{reason} {DISABLED_NOTICE}");
        }

        let fingerprint = issued.as_ref().map(|t| token_fingerprint(&t.token));
        info!(
            "DECIDE {} {} on {}: {} ({} {}), ticket={}",
            action.product,
            action.action_kind,
            action.host,
            verdict.outcome,
            assessment.label,
            assessment.score,
            fingerprint.as_deref().unwrap_or("none")
        );
        self.events.record(
            EventKind::Decide,
            json!({
                "product": action.product,
                "host": action.host,
                "action": action.action_kind,
                "length": action.original_length,
                "risk_label": assessment.label,
                "risk_score": assessment.score,
                "categories": assessment.matched_categories,
                "decision": verdict.outcome,
                "ticket": fingerprint,
                "enforced": self.is_enforcing(),
            }),
        );

        Ok(DecideResponse {
            decision: verdict.outcome,
            reason,
            risk_label: assessment.label,
            risk_score: assessment.score,
            matched_categories: assessment.matched_categories,
            length: action.original_length,
            preview: action.preview,
            truncated: action.truncated,
            expires_at_ms: issued.as_ref().map(|t| t.expires_at.timestamp_millis()),
            ticket: issued.map(|t| t.token),
            enforced: self.is_enforcing(),
        })
    }

    /// Runs a named demo scenario. Unknown keys resolve to the most restrictive one.
    pub async fn decide_scenario(&self, key: Option<&str>) -> Result<ScenarioResponse, GatewayError> {
        let scenario = resolve_scenario(key);
        let verdict = scenario.verdict();

        let issued = if verdict.ticket_eligible {
            let snapshot = ActionSnapshot {
                product: "demo".to_string(),
                host: "localhost".to_string(),
                action: "demo.scenario".to_string(),
                length: scenario.want.chars().count(),
                preview: scenario.want.to_string(),
                matched_categories: Vec::new(),
                risk_score: 0,
                risk_label: RiskLabel::Low,
                advisory: scenario.decision,
                scenario: Some(scenario.key.to_string()),
            };
            Some(self.issue(snapshot).await?)
        } else {
            None
        };

        let fingerprint = issued.as_ref().map(|t| token_fingerprint(&t.token));
        info!(
            "DEMO scenario '{}' -> {}, ticket={}",
            scenario.key,
            scenario.decision,
            fingerprint.as_deref().unwrap_or("none")
        );
        self.events.record(
            EventKind::Demo,
            json!({
                "requested": key,
                "scenario": scenario.key,
                "decision": scenario.decision,
                "ticket": fingerprint,
            }),
        );

        Ok(ScenarioResponse {
            scenario: scenario.key.to_string(),
            want: scenario.want.to_string(),
            decision: scenario.decision,
            why: scenario.why.to_string(),
            expires_at_ms: issued.as_ref().map(|t| t.expires_at.timestamp_millis()),
            ticket: issued.map(|t| t.token),
            enforced: self.is_enforcing(),
        })
    }

    /// Redeems a ticket with the human's choice and returns the binding decision.
    ///
    /// Only the first successful consume of a token can return ALLOW, and only
    /// when `choice` is `Allow`. The risk is not re-evaluated here.
    pub async fn consume(&self, token: &str, choice: Choice) -> Result<Decision, GatewayError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(GatewayError::InvalidInput("missing `ticket`".to_string()));
        }
        let fingerprint = token_fingerprint(token);

        let store = match &self.store {
            Some(store) if self.config.is_enforcing() => store,
            _ => {
                let decision = decision_for_choice(choice, Some(DISABLED_NOTICE));
                warn!("CONSUME {} without enforcement: {}", fingerprint, decision.outcome);
                self.record_consume(&fingerprint, None, Ok(&decision));
                return Ok(decision);
            }
        };

        let claimed = if is_well_formed_token(token) {
            store
                .consume(token, self.clock.now(), self.config.consumed_retention())
                .await
        } else {
            debug!("Rejecting malformed token {}.", fingerprint);
            Err(GatewayError::NotFound)
        };

        match claimed {
            Ok(record) => {
                let decision = decision_for_choice(choice, None);
                info!(
                    "CONSUME {} for {} on {}: {}",
                    fingerprint, record.snapshot.action, record.snapshot.host, decision.outcome
                );
                self.record_consume(&fingerprint, Some(&record), Ok(&decision));
                Ok(decision)
            }
            Err(e) => {
                if e.is_ticket_rejection() {
                    info!("CONSUME {} rejected: {}", fingerprint, e);
                } else {
                    error!("CONSUME {} failed: {}", fingerprint, e);
                }
                self.record_consume(&fingerprint, None, Err(&e));
                Err(e)
            }
        }
    }

    /// Like [`consume`](Self::consume), but folds every error into a BLOCK.
    pub async fn consume_decision(&self, token: &str, choice: Choice) -> Decision {
        match self.consume(token, choice).await {
            Ok(decision) => decision,
            Err(e) => Decision::block(e.block_reason()),
        }
    }

    /// Reclaims expired and no longer retained tickets.
    pub async fn sweep(&self) -> Result<usize, GatewayError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let removed = store.sweep(self.clock.now()).await?;
        if removed > 0 {
            debug!("Sweep removed {} tickets from the {} store.", removed, store.name());
            self.events
                .record(EventKind::Sweep, json!({ "removed": removed, "store": store.name() }));
        }
        Ok(removed)
    }

    async fn issue(&self, snapshot: ActionSnapshot) -> Result<IssuedTicket, GatewayError> {
        let now = self.clock.now();
        let ttl = self.config.ticket_ttl();

        let store = match &self.store {
            Some(store) if self.config.is_enforcing() => store,
            _ => {
                return Ok(IssuedTicket {
                    token: generate_token()?,
                    expires_at: now + ttl,
                });
            }
        };

        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let token = generate_token()?;
            let record = TicketRecord::new(snapshot.clone(), now, ttl);
            let expires_at = record.expires_at;
            match store.insert(&token, record).await {
                Ok(()) => return Ok(IssuedTicket { token, expires_at }),
                Err(GatewayError::DuplicateToken) => {
                    warn!("Token collision on attempt {}; minting another.", attempt);
                }
                Err(e) => return Err(e),
            }
        }
        Err(GatewayError::Fatal("could not mint a unique ticket token".to_string()))
    }

    fn record_consume(
        &self,
        fingerprint: &str,
        record: Option<&TicketRecord>,
        outcome: Result<&Decision, &GatewayError>,
    ) {
        let (decision, reason, error) = match outcome {
            Ok(decision) => (decision.outcome, decision.reason.clone(), None),
            Err(e) => (Outcome::Block, e.block_reason(), Some(e.code())),
        };
        self.events.record(
            EventKind::Consume,
            json!({
                "ticket": fingerprint,
                "host": record.map(|r| r.snapshot.host.as_str()),
                "action": record.map(|r| r.snapshot.action.as_str()),
                "scenario": record.and_then(|r| r.snapshot.scenario.as_deref()),
                "decision": decision,
                "reason": reason,
                "error": error,
            }),
        );
    }
}

fn decision_for_choice(choice: Choice, notice: Option<&str>) -> Decision {
    let decision = match choice {
        Choice::Allow => Decision::allow("User allowed."),
        Choice::Deny => Decision::block("User blocked."),
    };
    match notice {
        Some(notice) => Decision {
            reason: format!("{} {}", decision.reason, notice),
            ..decision
        },
        None => decision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnforcementMode;
    use crate::engines::regex_engine::RegexEngine;
    use crate::tickets::MemoryTicketStore;

    fn gateway(config: GatewayConfig) -> GatewayService {
        let engine: Arc<dyn ScanEngine> = Arc::new(RegexEngine::with_default_rules().unwrap());
        let store: Arc<dyn TicketStore> = Arc::new(MemoryTicketStore::new());
        GatewayService::new(config, engine, Some(store)).unwrap()
    }

    #[test]
    fn enforcing_without_store_is_refused() {
        let engine: Arc<dyn ScanEngine> = Arc::new(RegexEngine::with_default_rules().unwrap());
        let err = GatewayService::new(GatewayConfig::default(), engine, None).unwrap_err();
        assert!(matches!(err, GatewayError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn blank_ticket_is_invalid_input() {
        let gw = gateway(GatewayConfig::default());
        let err = gw.consume("   ", Choice::Allow).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn malformed_ticket_is_not_found() {
        let gw = gateway(GatewayConfig::default());
        let decision = gw.consume_decision("not-a-ticket", Choice::Allow).await;
        assert_eq!(decision.outcome, Outcome::Block);
        assert_eq!(decision.reason, "Expired or unknown approval token.");
    }

    #[tokio::test]
    async fn deny_consumes_the_ticket_too() {
        let gw = gateway(GatewayConfig::default());
        let response = gw
            .decide(ActionRequest::new("example.com", "chat.send", "hello"))
            .await
            .unwrap();
        let ticket = response.ticket.unwrap();
        let first = gw.consume(&ticket, Choice::Deny).await.unwrap();
        assert_eq!(first.outcome, Outcome::Block);
        assert!(matches!(
            gw.consume(&ticket, Choice::Allow).await,
            Err(GatewayError::AlreadyConsumed)
        ));
    }

    #[tokio::test]
    async fn disabled_mode_says_so() {
        let engine: Arc<dyn ScanEngine> = Arc::new(RegexEngine::with_default_rules().unwrap());
        let config = GatewayConfig {
            enforcement: EnforcementMode::Disabled,
            ..Default::default()
        };
        let gw = GatewayService::new(config, engine, None).unwrap();
        assert!(!gw.is_enforcing());
        assert_eq!(gw.store_name(), "disabled");
        let response = gw
            .decide(ActionRequest::new("example.com", "chat.send", "hello"))
            .await
            .unwrap();
        assert!(!response.enforced);
        assert!(response.reason.contains("Enforcement is disabled"));
    }
}
