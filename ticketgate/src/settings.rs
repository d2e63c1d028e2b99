// ticketgate/src/settings.rs
//! Daemon settings for `ticketgate serve`.
//!
//! Settings come from a YAML file (explicit `--config`, or the default location
//! under the user's config directory when it exists) and are then overridden by
//! command-line flags and their environment variables.

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use ticketgate_core::{merge_rules, EnforcementMode, GatewayConfig, ScannerConfig};

use crate::cli::{RuleArgs, ServeCommand, StoreKind};

pub const APP_DIR: &str = "ticketgate";
pub const DEFAULT_BIND: &str = "127.0.0.1:8788";
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const SETTINGS_FILE: &str = "config.yaml";
const TICKET_FILE: &str = "tickets.enc";

/// Ticket backend selection as written in the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreSettings {
    #[default]
    Memory,
    File {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonSettings {
    pub bind: String,
    pub store: StoreSettings,
    /// Seconds between expired-ticket sweeps; 0 turns the sweeper off.
    pub sweep_interval_secs: u64,
    pub rules_file: Option<PathBuf>,
    pub enable_rules: Vec<String>,
    pub disable_rules: Vec<String>,
    pub gateway: GatewayConfig,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            store: StoreSettings::Memory,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            rules_file: None,
            enable_rules: Vec::new(),
            disable_rules: Vec::new(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// `<config_dir>/ticketgate/config.yaml`, if the platform has a config directory.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
}

/// `<data_local_dir>/ticketgate/tickets.enc`, falling back to the working directory.
pub fn default_ticket_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR).join(TICKET_FILE))
        .unwrap_or_else(|| PathBuf::from(TICKET_FILE))
}

impl DaemonSettings {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: DaemonSettings = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        info!("Loaded daemon settings from {}.", path.display());
        Ok(settings)
    }

    /// Loads the explicit file, or the default file when present, or built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        match default_settings_path() {
            Some(path) if path.is_file() => Self::load_from_file(&path),
            _ => {
                debug!("No settings file found; using defaults.");
                Ok(Self::default())
            }
        }
    }

    /// Applies `serve` flags on top of the loaded settings.
    pub fn apply_overrides(&mut self, cmd: &ServeCommand) {
        if let Some(bind) = &cmd.bind {
            self.bind = bind.clone();
        }
        match cmd.store {
            Some(StoreKind::Memory) => self.store = StoreSettings::Memory,
            Some(StoreKind::Disabled) => self.store = StoreSettings::Disabled,
            Some(StoreKind::File) => {
                let path = match &self.store {
                    StoreSettings::File { path } => path.clone(),
                    _ => None,
                };
                self.store = StoreSettings::File { path };
            }
            None => {}
        }
        // A bare --store-path selects the file store.
        if let Some(store_path) = &cmd.store_path {
            match &mut self.store {
                StoreSettings::File { path } => *path = Some(store_path.clone()),
                _ if cmd.store.is_none() => {
                    self.store = StoreSettings::File {
                        path: Some(store_path.clone()),
                    }
                }
                _ => {}
            }
        }
        if let Some(ttl) = cmd.ttl {
            self.gateway.ticket_ttl_secs = ttl;
        }
        if let Some(interval) = cmd.sweep_interval {
            self.sweep_interval_secs = interval;
        }
        if cmd.rules.rules_file.is_some() {
            self.rules_file = cmd.rules.rules_file.clone();
        }
        self.enable_rules.extend(cmd.rules.enable.iter().cloned());
        self.disable_rules.extend(cmd.rules.disable.iter().cloned());

        // A disabled store and a disabled gateway mean the same thing.
        if self.store == StoreSettings::Disabled {
            self.gateway.enforcement = EnforcementMode::Disabled;
        } else if self.gateway.enforcement == EnforcementMode::Disabled {
            self.store = StoreSettings::Disabled;
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .map_err(|e| anyhow!("Invalid bind address '{}': {}", self.bind, e))
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;
        self.gateway.validate()?;
        Ok(())
    }

    pub fn rule_args(&self) -> RuleArgs {
        RuleArgs {
            rules_file: self.rules_file.clone(),
            enable: self.enable_rules.clone(),
            disable: self.disable_rules.clone(),
        }
    }
}

/// Builds the active registry: defaults, merged with the optional user file, then filtered.
pub fn load_scanner_config(args: &RuleArgs) -> Result<ScannerConfig> {
    let defaults = ScannerConfig::load_default_rules()?;
    let user = match &args.rules_file {
        Some(path) => Some(ScannerConfig::load_from_file(path)?),
        None => None,
    };
    let mut config = merge_rules(defaults, user);
    config.set_active_rules(&args.enable, &args.disable);
    Ok(config)
}
