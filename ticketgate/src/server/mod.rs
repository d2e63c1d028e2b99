// ticketgate/src/server/mod.rs
//! The local HTTP approval authority.
//!
//! Routes:
//! * `GET /status`, `GET /events`
//! * `POST /decide`, `POST /consume`, `POST /demo`
//!
//! Every response carries permissive CORS headers because the caller is a
//! browser extension; `OPTIONS` preflights are answered on every route.

pub mod handlers;

use anyhow::{Context, Result};
use axum::http::header::{self, HeaderValue};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use log::{debug, info, warn};
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use ticketgate_core::{EventKind, GatewayService};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayService>,
    /// Address the listener is bound to, as reported by `/status`.
    pub bind: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(handlers::status).options(handlers::preflight))
        .route("/decide", post(handlers::decide).options(handlers::preflight))
        .route("/consume", post(handlers::consume).options(handlers::preflight))
        .route("/demo", post(handlers::demo).options(handlers::preflight))
        .route("/events", get(handlers::events).options(handlers::preflight))
        .fallback(handlers::not_found)
        .layer(axum::middleware::map_response(cors_headers))
        .with_state(state)
}

async fn cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("content-type"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// Serves `gateway` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    gateway: Arc<GatewayService>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    gateway.events().record(
        EventKind::Startup,
        json!({
            "bind": addr.to_string(),
            "enforcing": gateway.is_enforcing(),
            "store": gateway.store_name(),
        }),
    );
    info!("ticketgate listening on http://{}", addr);

    let state = AppState {
        gateway,
        bind: addr.to_string(),
    };
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;
    info!("ticketgate stopped.");
    Ok(())
}

/// Handle for a server running on a background task. Dropping it stops the server.
pub struct ServerHandle {
    addr: SocketAddr,
    join: JoinHandle<()>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.join.abort();
    }
}

/// Binds `addr` (use port 0 for an ephemeral port) and serves in the background.
pub async fn spawn(addr: &str, gateway: Arc<GatewayService>) -> Result<ServerHandle> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let addr = listener.local_addr().context("Listener has no local address")?;
    let join = tokio::spawn(async move {
        if let Err(e) = serve(listener, gateway, std::future::pending()).await {
            warn!("Background server exited: {:#}", e);
        }
    });
    Ok(ServerHandle { addr, join })
}

/// Periodically reclaims expired tickets. Expiry is enforced on access regardless.
pub fn spawn_sweeper(gateway: Arc<GatewayService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match gateway.sweep().await {
                Ok(removed) => debug!("Sweep pass removed {} tickets.", removed),
                Err(e) => warn!("Ticket sweep failed: {}", e),
            }
        }
    })
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested.");
}
