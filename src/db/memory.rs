//! In-memory store used by unit tests in place of Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::blacklist::store::BlacklistStore;
use crate::blacklist::types::{BlacklistEntry, BlacklistSnapshot};
use crate::ingest::types::Pair;

use super::repository::latest_per_pair;
use super::PairStore;

#[derive(Default)]
pub struct MemoryStore {
    blacklist: Mutex<BTreeMap<String, BlacklistEntry>>,
    pairs: Mutex<BTreeMap<String, Pair>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn blacklist_entries(&self) -> Vec<BlacklistEntry> {
        self.blacklist.lock().unwrap().values().cloned().collect()
    }

    pub fn saved_pairs(&self) -> Vec<Pair> {
        self.pairs.lock().unwrap().values().cloned().collect()
    }

    fn check_writable(&self) -> eyre::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(eyre::eyre!("store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl BlacklistStore for MemoryStore {
    async fn add(&self, entry: &BlacklistEntry) -> eyre::Result<bool> {
        self.check_writable()?;
        let mut blacklist = self.blacklist.lock().unwrap();
        if blacklist.contains_key(&entry.address) {
            return Ok(false);
        }
        blacklist.insert(entry.address.clone(), entry.clone());
        Ok(true)
    }

    async fn snapshot(&self) -> eyre::Result<BlacklistSnapshot> {
        let blacklist = self.blacklist.lock().unwrap();
        Ok(BlacklistSnapshot::from_entries(
            blacklist.values().map(|e| (e.address.clone(), e.kind)),
        ))
    }

    async fn purge_listed_before(&self, cutoff: DateTime<Utc>) -> eyre::Result<u64> {
        self.check_writable()?;
        let mut blacklist = self.blacklist.lock().unwrap();
        let before = blacklist.len();
        blacklist.retain(|_, e| e.listed_at >= cutoff);
        Ok((before - blacklist.len()) as u64)
    }
}

#[async_trait]
impl PairStore for MemoryStore {
    async fn save_pairs(&self, pairs: &[Pair]) -> eyre::Result<u64> {
        self.check_writable()?;
        let rows = latest_per_pair(pairs);
        let mut stored = self.pairs.lock().unwrap();
        for pair in &rows {
            stored.insert(pair.pair_address.to_string(), (*pair).clone());
        }
        Ok(rows.len() as u64)
    }
}
