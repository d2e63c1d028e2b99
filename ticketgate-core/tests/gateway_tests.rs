// ticketgate-core/tests/gateway_tests.rs
//! End-to-end behaviour of `GatewayService` over the memory store: decide,
//! consume, replay, expiry, concurrency and storage failure.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use ticketgate_core::{
    ActionRequest, Choice, EnforcementMode, EventKind, GatewayConfig, GatewayError, GatewayService, ManualClock,
    MemoryTicketStore, Outcome, RegexEngine, RiskLabel, ScanEngine, TicketRecord, TicketStore,
};

fn engine() -> Arc<dyn ScanEngine> {
    Arc::new(RegexEngine::with_default_rules().unwrap())
}

fn gateway_with(config: GatewayConfig, store: Arc<dyn TicketStore>) -> GatewayService {
    GatewayService::new(config, engine(), Some(store)).unwrap()
}

fn gateway() -> GatewayService {
    gateway_with(GatewayConfig::default(), Arc::new(MemoryTicketStore::new()))
}

fn chat(text: &str) -> ActionRequest {
    ActionRequest::new("chat.example.com", "chat.send", text).with_product("chatgpt")
}

#[test_log::test(tokio::test)]
async fn password_scenario_is_blocked_without_ticket() {
    let gw = gateway();
    let response = gw.decide(chat("password: hunter12345")).await.unwrap();

    assert_eq!(response.matched_categories, vec!["Password".to_string()]);
    assert_eq!(response.risk_score, 85);
    assert_eq!(response.risk_label, RiskLabel::High);
    assert_eq!(response.decision, Outcome::Block);
    assert!(response.ticket.is_none());
    assert!(response.expires_at_ms.is_none());
}

#[test_log::test(tokio::test)]
async fn summarize_scenario_round_trip() {
    let gw = gateway();
    let response = gw.decide(chat("please summarize this PDF")).await.unwrap();

    assert!(response.matched_categories.is_empty());
    assert_eq!(response.risk_score, 10);
    assert_eq!(response.risk_label, RiskLabel::Low);
    assert_eq!(response.decision, Outcome::Allow);
    assert!(response.enforced);
    let ticket = response.ticket.expect("low risk actions receive a ticket");

    let first = gw.consume(&ticket, Choice::Allow).await.unwrap();
    assert_eq!(first.outcome, Outcome::Allow);

    let replay = gw.consume(&ticket, Choice::Allow).await.unwrap_err();
    assert!(matches!(replay, GatewayError::AlreadyConsumed));
    let folded = gw.consume_decision(&ticket, Choice::Allow).await;
    assert_eq!(folded.outcome, Outcome::Block);
    assert_eq!(folded.reason, "Already approved once (replay blocked).");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_consumes_allow_exactly_once() {
    let gw = Arc::new(gateway());
    let ticket = gw
        .decide(chat("please summarize this PDF"))
        .await
        .unwrap()
        .ticket
        .unwrap();

    const N: usize = 64;
    let mut handles = Vec::with_capacity(N);
    for _ in 0..N {
        let gw = Arc::clone(&gw);
        let ticket = ticket.clone();
        handles.push(tokio::spawn(async move { gw.consume(&ticket, Choice::Allow).await }));
    }

    let mut allowed = 0;
    let mut replayed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(decision) => {
                assert_eq!(decision.outcome, Outcome::Allow);
                allowed += 1;
            }
            Err(GatewayError::AlreadyConsumed) => replayed += 1,
            Err(other) => panic!("unexpected consume error: {other}"),
        }
    }
    assert_eq!(allowed, 1);
    assert_eq!(replayed, N - 1);
}

#[tokio::test]
async fn consume_after_ttl_is_expired_not_replay() {
    let start = Utc::now();
    let clock = Arc::new(ManualClock::new(start));
    let gw = gateway().with_clock(clock.clone());

    let ticket = gw.decide(chat("hello")).await.unwrap().ticket.unwrap();
    clock.advance(Duration::minutes(5) + Duration::seconds(1));

    let err = gw.consume(&ticket, Choice::Allow).await.unwrap_err();
    assert!(matches!(err, GatewayError::Expired | GatewayError::NotFound));

    // The expired record is gone; asking again cannot turn into a replay.
    let again = gw.consume(&ticket, Choice::Allow).await.unwrap_err();
    assert!(matches!(again, GatewayError::NotFound));
}

#[tokio::test]
async fn consume_just_before_expiry_still_works() {
    let start = Utc::now();
    let clock = Arc::new(ManualClock::new(start));
    let gw = gateway().with_clock(clock.clone());

    let ticket = gw.decide(chat("hello")).await.unwrap().ticket.unwrap();
    clock.advance(Duration::minutes(5));
    assert_eq!(gw.consume(&ticket, Choice::Allow).await.unwrap().outcome, Outcome::Allow);
}

#[tokio::test]
async fn replay_window_ends_in_not_found() {
    let start = Utc::now();
    let clock = Arc::new(ManualClock::new(start));
    let config = GatewayConfig {
        consumed_retention_secs: 10,
        ..Default::default()
    };
    let gw = gateway_with(config, Arc::new(MemoryTicketStore::new())).with_clock(clock.clone());

    let ticket = gw.decide(chat("hello")).await.unwrap().ticket.unwrap();
    gw.consume(&ticket, Choice::Deny).await.unwrap();
    clock.advance(Duration::seconds(5));
    assert!(matches!(
        gw.consume(&ticket, Choice::Allow).await,
        Err(GatewayError::AlreadyConsumed)
    ));
    clock.advance(Duration::seconds(10));
    assert!(matches!(
        gw.consume(&ticket, Choice::Allow).await,
        Err(GatewayError::NotFound)
    ));
}

#[tokio::test]
async fn unknown_ticket_is_not_found() {
    let gw = gateway();
    let unknown = format!("tkt_{}", "0".repeat(64));
    assert!(matches!(
        gw.consume(&unknown, Choice::Allow).await,
        Err(GatewayError::NotFound)
    ));
}

#[tokio::test]
async fn missing_host_is_rejected_before_scanning() {
    let gw = gateway();
    let request = ActionRequest {
        action: Some("chat.send".to_string()),
        text: Some("password: hunter12345".to_string()),
        ..Default::default()
    };
    let err = gw.decide(request).await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidInput(_)));
    assert!(gw.events().is_empty());
}

#[tokio::test]
async fn long_clean_text_is_truncated_and_still_eligible() {
    let gw = gateway();
    let response = gw.decide(chat(&"a".repeat(9000))).await.unwrap();
    assert!(response.truncated);
    assert_eq!(response.length, 9000);
    assert_eq!(response.preview.chars().count(), 200);
    // Scored on the 6000 capped characters: 10 + 15 + 10.
    assert_eq!(response.risk_score, 35);
    assert!(response.ticket.is_some());
}

#[derive(Debug)]
struct FailingStore;

#[async_trait]
impl TicketStore for FailingStore {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn insert(&self, _token: &str, _record: TicketRecord) -> Result<(), GatewayError> {
        Err(GatewayError::StorageUnavailable("disk full".to_string()))
    }

    async fn consume(
        &self,
        _token: &str,
        _now: DateTime<Utc>,
        _retention: Duration,
    ) -> Result<TicketRecord, GatewayError> {
        Err(GatewayError::StorageUnavailable("disk full".to_string()))
    }

    async fn get(&self, _token: &str) -> Result<Option<TicketRecord>, GatewayError> {
        Err(GatewayError::StorageUnavailable("disk full".to_string()))
    }

    async fn sweep(&self, _now: DateTime<Utc>) -> Result<usize, GatewayError> {
        Err(GatewayError::StorageUnavailable("disk full".to_string()))
    }

    async fn len(&self) -> Result<usize, GatewayError> {
        Err(GatewayError::StorageUnavailable("disk full".to_string()))
    }
}

#[tokio::test]
async fn storage_failure_fails_closed_on_both_paths() {
    let gw = gateway_with(GatewayConfig::default(), Arc::new(FailingStore));

    let err = gw.decide(chat("please summarize this PDF")).await.unwrap_err();
    assert!(matches!(err, GatewayError::StorageUnavailable(_)));

    let token = format!("tkt_{}", "a".repeat(64));
    let decision = gw.consume_decision(&token, Choice::Allow).await;
    assert_eq!(decision.outcome, Outcome::Block);
    assert!(!decision.reason.contains("disk full"));

    // High risk never touches the store, so it still answers.
    let blocked = gw.decide(chat("password: hunter12345")).await.unwrap();
    assert_eq!(blocked.decision, Outcome::Block);
}

#[tokio::test]
async fn disabled_enforcement_is_explicit_everywhere() {
    let config = GatewayConfig {
        enforcement: EnforcementMode::Disabled,
        ..Default::default()
    };
    let gw = GatewayService::new(config, engine(), None).unwrap();
    assert!(!gw.is_enforcing());
    assert!(!gw.is_durable());
    assert_eq!(gw.store_name(), "disabled");

    let response = gw.decide(chat("hello")).await.unwrap();
    assert!(!response.enforced);
    assert!(response.reason.contains("Enforcement is disabled"));
    let ticket = response.ticket.unwrap();

    let decision = gw.consume(&ticket, Choice::Allow).await.unwrap();
    assert!(decision.reason.contains("Enforcement is disabled"));
}

#[tokio::test]
async fn demo_scenarios_only_ticket_allowed_ones() {
    let gw = gateway();

    let safe = gw.decide_scenario(Some("safe")).await.unwrap();
    assert_eq!(safe.decision, Outcome::Allow);
    let ticket = safe.ticket.unwrap();
    assert_eq!(gw.consume(&ticket, Choice::Allow).await.unwrap().outcome, Outcome::Allow);

    let unknown = gw.decide_scenario(Some("definitely-not-a-scenario")).await.unwrap();
    assert_eq!(unknown.scenario, "risky");
    assert_eq!(unknown.decision, Outcome::Block);
    assert!(unknown.ticket.is_none());
}

#[tokio::test]
async fn events_never_carry_text_or_tokens() {
    let gw = gateway();
    let secret = "my api_key = abcdefghijklmnopqrstuvwxyz";
    gw.decide(chat(secret)).await.unwrap();
    let ticket = gw.decide(chat("please summarize this PDF")).await.unwrap().ticket.unwrap();
    gw.consume(&ticket, Choice::Allow).await.unwrap();

    let events = gw.events().recent();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].kind, EventKind::Consume);
    assert_eq!(events[2].kind, EventKind::Decide);

    let dump = serde_json::to_string(&events).unwrap();
    assert!(!dump.contains("abcdefghijklmnopqrstuvwxyz"));
    assert!(!dump.contains("summarize"));
    assert!(!dump.contains(&ticket));
}

#[tokio::test]
async fn sweep_reclaims_expired_tickets() {
    let start = Utc::now();
    let clock = Arc::new(ManualClock::new(start));
    let store = Arc::new(MemoryTicketStore::new());
    let gw = gateway_with(GatewayConfig::default(), store.clone()).with_clock(clock.clone());

    for _ in 0..3 {
        gw.decide(chat("hello")).await.unwrap();
    }
    assert_eq!(store.len().await.unwrap(), 3);

    clock.advance(Duration::minutes(6));
    assert_eq!(gw.sweep().await.unwrap(), 3);
    assert_eq!(store.len().await.unwrap(), 0);
    assert_eq!(gw.events().recent()[0].kind, EventKind::Sweep);
}
