//! tickets - Single-use approval tickets and the stores that hold them.
//!
//! A ticket is minted by `Decide`, handed to the human as an opaque token and
//! redeemed at most once by `Consume`. Stores implement [`TicketStore`]; the
//! consume transition itself lives in [`claim_in_map`] so every map-backed
//! store applies the same state machine under its own lock.
//!
//! License: MIT OR APACHE 2.0

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::TryRngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::action::ActionSnapshot;
use crate::errors::GatewayError;

pub mod memory;

pub use memory::MemoryTicketStore;

pub const TOKEN_PREFIX: &str = "tkt_";
/// Random bytes behind every token (256 bits).
pub const TOKEN_BYTES: usize = 32;
const FINGERPRINT_CHARS: usize = 12;

/// State kept for one issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub used: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub consumed_at: Option<DateTime<Utc>>,
    /// After this instant a consumed record may be dropped.
    #[serde(default)]
    pub retain_until: Option<DateTime<Utc>>,
    pub snapshot: ActionSnapshot,
}

impl TicketRecord {
    pub fn new(snapshot: ActionSnapshot, created_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            used: false,
            created_at,
            expires_at: created_at + ttl,
            consumed_at: None,
            retain_until: None,
            snapshot,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.used && now > self.expires_at
    }

    /// True once a record no longer needs to be kept at all.
    pub fn is_reclaimable(&self, now: DateTime<Utc>) -> bool {
        if self.used {
            self.retain_until.is_none_or(|until| now > until)
        } else {
            now > self.expires_at
        }
    }

    fn mark_used(&mut self, now: DateTime<Utc>, retention: Duration) {
        self.used = true;
        self.consumed_at = Some(now);
        self.retain_until = Some(now + retention);
    }
}

/// Applies the consume transition to `token` inside an already-locked map.
///
/// Expired and reclaimable entries are removed on the way. On success the
/// record is flipped to used and a copy of it is returned.
pub fn claim_in_map(
    tickets: &mut HashMap<String, TicketRecord>,
    token: &str,
    now: DateTime<Utc>,
    retention: Duration,
) -> Result<TicketRecord, GatewayError> {
    let Some(record) = tickets.get_mut(token) else {
        return Err(GatewayError::NotFound);
    };
    if record.used {
        if record.is_reclaimable(now) {
            tickets.remove(token);
            return Err(GatewayError::NotFound);
        }
        return Err(GatewayError::AlreadyConsumed);
    }
    if record.is_expired(now) {
        tickets.remove(token);
        return Err(GatewayError::Expired);
    }
    record.mark_used(now, retention);
    Ok(record.clone())
}

/// Removes every reclaimable record and returns how many were dropped.
pub fn sweep_map(tickets: &mut HashMap<String, TicketRecord>, now: DateTime<Utc>) -> usize {
    let before = tickets.len();
    tickets.retain(|_, record| !record.is_reclaimable(now));
    before - tickets.len()
}

/// Storage for issued tickets.
///
/// `consume` must be atomic: among any number of concurrent calls for the same
/// token, at most one returns `Ok`.
#[async_trait]
pub trait TicketStore: Send + Sync + fmt::Debug {
    /// Short name used in logs and `/status`.
    fn name(&self) -> &'static str;

    /// Whether tickets survive a restart of the process.
    fn is_durable(&self) -> bool {
        false
    }

    /// Stores a fresh ticket. Fails with `DuplicateToken` if the token is already present.
    async fn insert(&self, token: &str, record: TicketRecord) -> Result<(), GatewayError>;

    /// Atomically redeems `token`, returning the record as it was claimed.
    async fn consume(
        &self,
        token: &str,
        now: DateTime<Utc>,
        retention: Duration,
    ) -> Result<TicketRecord, GatewayError>;

    async fn get(&self, token: &str) -> Result<Option<TicketRecord>, GatewayError>;

    /// Drops expired and no longer retained tickets.
    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, GatewayError>;

    async fn len(&self) -> Result<usize, GatewayError>;
}

/// Mints a new unguessable token from the operating system's secure RNG.
///
/// An unavailable RNG is reported as `Fatal`; callers turn that into a BLOCK.
pub fn generate_token() -> Result<String, GatewayError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| GatewayError::Fatal(format!("secure random source unavailable: {e}")))?;
    Ok(format!("{TOKEN_PREFIX}{}", hex::encode(bytes)))
}

/// Whether `token` has the shape of something `generate_token` could have produced.
pub fn is_well_formed_token(token: &str) -> bool {
    token
        .strip_prefix(TOKEN_PREFIX)
        .is_some_and(|hex_part| hex_part.len() == TOKEN_BYTES * 2 && hex_part.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Short, non-reversible identifier for a token, safe to write to logs and events.
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(FINGERPRINT_CHARS);
    encoded
}

/// Source of the current time for ticket bookkeeping.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Used to test expiry deterministically.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
