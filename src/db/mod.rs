use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::blacklist::store::BlacklistStore;
use crate::blacklist::types::{BlacklistEntry, BlacklistSnapshot};
use crate::ingest::types::Pair;

#[cfg(test)]
pub mod memory;
pub mod repository;

/// Sink for processed pair batches.
#[async_trait]
pub trait PairStore: Send + Sync {
    /// Persist a batch. Returns rows written.
    async fn save_pairs(&self, pairs: &[Pair]) -> eyre::Result<u64>;
}

/// Postgres-backed implementation of the store traits.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlacklistStore for PgStore {
    async fn add(&self, entry: &BlacklistEntry) -> eyre::Result<bool> {
        repository::insert_blacklist_entry(&self.pool, entry).await
    }

    async fn snapshot(&self) -> eyre::Result<BlacklistSnapshot> {
        let entries = repository::fetch_blacklist(&self.pool).await?;
        Ok(BlacklistSnapshot::from_entries(entries))
    }

    async fn purge_listed_before(&self, cutoff: DateTime<Utc>) -> eyre::Result<u64> {
        repository::delete_blacklist_before(&self.pool, cutoff).await
    }
}

#[async_trait]
impl PairStore for PgStore {
    async fn save_pairs(&self, pairs: &[Pair]) -> eyre::Result<u64> {
        repository::upsert_pairs_batch(&self.pool, pairs).await
    }
}
