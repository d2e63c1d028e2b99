// ticketgate/src/server/handlers.rs
//! Request handlers for the local approval authority.
//!
//! Bodies are taken as raw bytes and parsed here so malformed JSON is answered
//! with the same envelope as every other failure: `ok: false` plus a BLOCK.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use ticketgate_core::{ActionRequest, Choice, GatewayError, Outcome};

use super::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConsumeBody {
    ticket: Option<String>,
    choice: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DemoBody {
    scenario: Option<String>,
}

/// Successful payloads are flattened next to `ok: true`.
#[derive(Serialize)]
struct Envelope<T: Serialize> {
    ok: bool,
    #[serde(flatten)]
    body: T,
}

fn ok<T: Serialize>(body: T) -> Response {
    (StatusCode::OK, Json(Envelope { ok: true, body })).into_response()
}

/// HTTP status for a gateway failure.
pub fn status_for(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        GatewayError::NotFound | GatewayError::Expired | GatewayError::AlreadyConsumed => StatusCode::FORBIDDEN,
        GatewayError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn blocked(err: &GatewayError, enforced: bool) -> Response {
    (
        status_for(err),
        Json(json!({
            "ok": false,
            "decision": Outcome::Block,
            "reason": err.block_reason(),
            "error": err.code(),
            "enforced": enforced,
        })),
    )
        .into_response()
}

/// An empty body is read as `{}`; anything else must be a JSON object of type `T`.
fn parse_body<T: DeserializeOwned + Default>(bytes: &Bytes) -> Result<T, GatewayError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|e| {
        debug!("Rejecting malformed request body: {}", e);
        GatewayError::InvalidInput("request body is not valid JSON".to_string())
    })
}

pub async fn status(State(state): State<AppState>) -> Response {
    let gateway = &state.gateway;
    ok(json!({
        "service": "ticketgate",
        "version": env!("CARGO_PKG_VERSION"),
        "bind": state.bind,
        "enforcing": gateway.is_enforcing(),
        "store": gateway.store_name(),
        "durable": gateway.is_durable(),
        "ticket_ttl_secs": gateway.config().ticket_ttl_secs,
        "ts_ms": Utc::now().timestamp_millis(),
    }))
}

pub async fn decide(State(state): State<AppState>, bytes: Bytes) -> Response {
    let gateway = &state.gateway;
    let request: ActionRequest = match parse_body(&bytes) {
        Ok(request) => request,
        Err(e) => return blocked(&e, gateway.is_enforcing()),
    };
    match gateway.decide(request).await {
        Ok(response) => ok(response),
        Err(e) => {
            warn!("/decide failed closed: {}", e);
            blocked(&e, gateway.is_enforcing())
        }
    }
}

pub async fn consume(State(state): State<AppState>, bytes: Bytes) -> Response {
    let gateway = &state.gateway;
    let body: ConsumeBody = match parse_body(&bytes) {
        Ok(body) => body,
        Err(e) => return blocked(&e, gateway.is_enforcing()),
    };
    let choice = Choice::parse(body.choice.as_deref());
    let ticket = body.ticket.unwrap_or_default();
    match gateway.consume(&ticket, choice).await {
        Ok(decision) => ok(json!({
            "decision": decision.outcome,
            "reason": decision.reason,
            "enforced": gateway.is_enforcing(),
        })),
        Err(e) => blocked(&e, gateway.is_enforcing()),
    }
}

pub async fn demo(State(state): State<AppState>, bytes: Bytes) -> Response {
    let gateway = &state.gateway;
    let body: DemoBody = match parse_body(&bytes) {
        Ok(body) => body,
        Err(e) => return blocked(&e, gateway.is_enforcing()),
    };
    match gateway.decide_scenario(body.scenario.as_deref()).await {
        Ok(response) => ok(response),
        Err(e) => {
            warn!("/demo failed closed: {}", e);
            blocked(&e, gateway.is_enforcing())
        }
    }
}

pub async fn events(State(state): State<AppState>) -> Response {
    ok(json!({ "events": state.gateway.events().recent() }))
}

pub async fn preflight() -> Json<serde_json::Value> {
    Json(json!({}))
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "ok": false, "error": "not found" })))
}
