//! memory.rs - In-process ticket store.
//!
//! Tickets are spread over a fixed number of shards, each behind its own mutex,
//! so unrelated tokens do not contend. A consume takes exactly one shard lock
//! and never awaits while holding it.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, error};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

use super::{claim_in_map, sweep_map, TicketRecord, TicketStore};
use crate::errors::GatewayError;

const SHARD_COUNT: usize = 16;

type Shard = Mutex<HashMap<String, TicketRecord>>;

#[derive(Debug)]
pub struct MemoryTicketStore {
    shards: Vec<Shard>,
}

impl Default for MemoryTicketStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard_for(&self, token: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }

    /// A poisoned shard means a previous holder panicked mid-update; its
    /// contents can no longer be trusted, so the store reports itself unavailable.
    fn lock(shard: &Shard) -> Result<MutexGuard<'_, HashMap<String, TicketRecord>>, GatewayError> {
        shard.lock().map_err(|_| {
            error!("Ticket shard lock is poisoned.");
            GatewayError::StorageUnavailable("ticket shard lock poisoned".to_string())
        })
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, token: &str, record: TicketRecord) -> Result<(), GatewayError> {
        let mut tickets = Self::lock(self.shard_for(token))?;
        if tickets.contains_key(token) {
            return Err(GatewayError::DuplicateToken);
        }
        tickets.insert(token.to_string(), record);
        Ok(())
    }

    async fn consume(
        &self,
        token: &str,
        now: DateTime<Utc>,
        retention: Duration,
    ) -> Result<TicketRecord, GatewayError> {
        let mut tickets = Self::lock(self.shard_for(token))?;
        claim_in_map(&mut tickets, token, now, retention)
    }

    async fn get(&self, token: &str) -> Result<Option<TicketRecord>, GatewayError> {
        let tickets = Self::lock(self.shard_for(token))?;
        Ok(tickets.get(token).cloned())
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, GatewayError> {
        let mut removed = 0;
        for shard in &self.shards {
            let mut tickets = Self::lock(shard)?;
            removed += sweep_map(&mut tickets, now);
        }
        debug!("Memory store sweep removed {} tickets.", removed);
        Ok(removed)
    }

    async fn len(&self) -> Result<usize, GatewayError> {
        let mut total = 0;
        for shard in &self.shards {
            total += Self::lock(shard)?.len();
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tickets::tests::snapshot;
    use std::sync::Arc;

    #[tokio::test]
    async fn insert_rejects_duplicates() {
        let store = MemoryTicketStore::new();
        let record = TicketRecord::new(snapshot(), Utc::now(), Duration::seconds(60));
        store.insert("tkt_a", record.clone()).await.unwrap();
        assert!(matches!(
            store.insert("tkt_a", record).await,
            Err(GatewayError::DuplicateToken)
        ));
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumes_have_one_winner() {
        let store = Arc::new(MemoryTicketStore::new());
        let now = Utc::now();
        store
            .insert("tkt_race", TicketRecord::new(snapshot(), now, Duration::seconds(60)))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.consume("tkt_race", now, Duration::seconds(60)).await
            }));
        }
        let mut wins = 0;
        let mut replays = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(GatewayError::AlreadyConsumed) => replays += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(replays, 31);
    }

    #[tokio::test]
    async fn sweep_drops_expired_and_retained_out_records() {
        let store = MemoryTicketStore::new();
        let start = Utc::now();
        store
            .insert("tkt_old", TicketRecord::new(snapshot(), start, Duration::seconds(10)))
            .await
            .unwrap();
        store
            .insert("tkt_used", TicketRecord::new(snapshot(), start, Duration::seconds(100)))
            .await
            .unwrap();
        store
            .insert("tkt_live", TicketRecord::new(snapshot(), start, Duration::seconds(100)))
            .await
            .unwrap();
        store.consume("tkt_used", start, Duration::seconds(5)).await.unwrap();

        let removed = store.sweep(start + Duration::seconds(20)).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.get("tkt_live").await.unwrap().is_some());
    }
}
