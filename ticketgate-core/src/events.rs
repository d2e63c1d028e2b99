//! events.rs - Bounded in-memory log of gateway activity.
//!
//! Events carry decisions, categories, sizes and token fingerprints. They never
//! carry action text or raw tokens.
//!
//! License: MIT OR APACHE 2.0

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Startup,
    Decide,
    Consume,
    Demo,
    Sweep,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub ts_ms: i64,
    pub kind: EventKind,
    pub data: Value,
}

/// Ring buffer of the most recent events.
#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    events: Mutex<VecDeque<GatewayEvent>>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, kind: EventKind, data: Value) {
        let event = GatewayEvent {
            ts_ms: Utc::now().timestamp_millis(),
            kind,
            data,
        };
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.push_front(event);
        events.truncate(self.capacity);
    }

    /// Returns the retained events, most recent first.
    pub fn recent(&self) -> Vec<GatewayEvent> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
