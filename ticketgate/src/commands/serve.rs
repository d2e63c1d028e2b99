// ticketgate/src/commands/serve.rs
//! `ticketgate serve`: runs the approval authority until Ctrl-C.

use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use log::{info, warn};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use ticketgate_core::{GatewayService, RegexEngine, ScanEngine};

use crate::cli::ServeCommand;
use crate::server::{self, shutdown_signal, spawn_sweeper};
use crate::settings::{load_scanner_config, DaemonSettings};
use crate::store::open_store;
use crate::ui::output_format::{print_info_message, print_warn_message};

/// Builds the gateway described by `settings`.
pub fn build_gateway(settings: &DaemonSettings) -> Result<GatewayService> {
    let scanner = load_scanner_config(&settings.rule_args())?;
    let engine: Arc<dyn ScanEngine> =
        Arc::new(RegexEngine::new(scanner).context("Failed to build the secret scanner")?);
    info!("Loaded {} secret rules.", engine.compiled_rules().len());

    let store = open_store(&settings.store)?;
    GatewayService::new(settings.gateway.clone(), engine, store).context("Failed to start the gateway")
}

pub async fn run_serve(cmd: &ServeCommand) -> Result<()> {
    let mut settings = DaemonSettings::load(cmd.config.as_deref())?;
    settings.apply_overrides(cmd);
    settings.validate()?;

    let gateway = Arc::new(build_gateway(&settings)?);
    let addr = settings.bind_addr()?;
    if !addr.ip().is_loopback() {
        warn!("Binding to non-loopback address {}; the authority is reachable from the network.", addr);
    }
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let color = io::stderr().is_terminal();
    let mut stderr = io::stderr();
    print_info_message(
        &mut stderr,
        &format!("Approval authority on http://{addr} (store: {}). Press Ctrl-C to stop.", gateway.store_name()),
        color,
    )?;
    if !gateway.is_enforcing() {
        print_warn_message(&mut stderr, "Enforcement is disabled: approvals are not enforced.", color)?;
    }

    let sweeper = (settings.sweep_interval_secs > 0).then(|| {
        spawn_sweeper(
            Arc::clone(&gateway),
            Duration::from_secs(settings.sweep_interval_secs),
        )
    });

    let served = server::serve(listener, gateway, shutdown_signal()).await;
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    served
}
