// ticketgate/src/store/mod.rs
//! Ticket store backends available to the daemon.

pub mod file_store;

use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;

use ticketgate_core::{MemoryTicketStore, TicketStore};

use crate::settings::{default_ticket_path, StoreSettings};

pub use file_store::{FileStoreError, FileTicketStore};

/// Opens the backend named in the settings. `Disabled` yields no store.
pub fn open_store(settings: &StoreSettings) -> Result<Option<Arc<dyn TicketStore>>> {
    match settings {
        StoreSettings::Memory => {
            info!("Using in-memory ticket store; tickets do not survive a restart.");
            Ok(Some(Arc::new(MemoryTicketStore::new())))
        }
        StoreSettings::File { path } => {
            let path = path.clone().unwrap_or_else(default_ticket_path);
            let store = FileTicketStore::open(&path)
                .with_context(|| format!("Failed to open ticket file {}", path.display()))?;
            Ok(Some(Arc::new(store)))
        }
        StoreSettings::Disabled => Ok(None),
    }
}
