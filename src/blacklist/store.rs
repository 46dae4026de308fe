use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::config::FilterConfig;

use super::types::{BlacklistEntry, BlacklistKind, BlacklistSnapshot, PREDEFINED_REASON};

/// Persistent set of banned coin and dev addresses.
#[async_trait]
pub trait BlacklistStore: Send + Sync {
    /// Insert an entry. Re-adding a listed address is a no-op; returns whether
    /// a row was written.
    async fn add(&self, entry: &BlacklistEntry) -> eyre::Result<bool>;

    /// Fresh view of every listed address.
    async fn snapshot(&self) -> eyre::Result<BlacklistSnapshot>;

    /// Delete entries listed strictly before `cutoff`. Returns rows removed.
    async fn purge_listed_before(&self, cutoff: DateTime<Utc>) -> eyre::Result<u64>;
}

/// Add `address` to the blacklist now, logging the outcome. Failures are
/// logged and reported as `false` so a single bad write does not end a cycle.
pub async fn ban(
    store: &dyn BlacklistStore,
    address: &str,
    kind: BlacklistKind,
    reason: &str,
) -> bool {
    let entry = BlacklistEntry {
        address: address.to_string(),
        kind,
        reason: reason.to_string(),
        listed_at: Utc::now(),
    };
    match store.add(&entry).await {
        Ok(inserted) => {
            if inserted {
                tracing::info!(
                    address = %address,
                    kind = kind.as_str(),
                    reason = %reason,
                    "Added to blacklist"
                );
            }
            true
        }
        Err(e) => {
            tracing::error!(address = %address, error = %e, "Error adding to blacklist");
            false
        }
    }
}

/// Seed the blacklist from the configured coin and dev lists (idempotent).
pub async fn seed_from_config(
    store: &dyn BlacklistStore,
    filters: &FilterConfig,
) -> eyre::Result<usize> {
    let now = Utc::now();
    let mut inserted = 0;

    let seeds = filters
        .coin_blacklist
        .iter()
        .map(|a| (a, BlacklistKind::Coin))
        .chain(filters.dev_blacklist.iter().map(|a| (a, BlacklistKind::Dev)));

    for (address, kind) in seeds {
        let entry = BlacklistEntry {
            address: address.trim().to_string(),
            kind,
            reason: PREDEFINED_REASON.to_string(),
            listed_at: now,
        };
        if store.add(&entry).await? {
            inserted += 1;
        }
    }

    tracing::info!(
        coins = filters.coin_blacklist.len(),
        devs = filters.dev_blacklist.len(),
        inserted,
        "Initial blacklists seeded"
    );
    Ok(inserted)
}

/// Drop every entry older than the retention window, regardless of its reason.
pub async fn purge_expired(
    store: &dyn BlacklistStore,
    now: DateTime<Utc>,
    retention: Duration,
) -> eyre::Result<u64> {
    let removed = store.purge_listed_before(now - retention).await?;
    tracing::info!(removed, "Blacklists refreshed");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;

    fn entry(address: &str, reason: &str, listed_at: DateTime<Utc>) -> BlacklistEntry {
        BlacklistEntry {
            address: address.to_string(),
            kind: BlacklistKind::Coin,
            reason: reason.to_string(),
            listed_at,
        }
    }

    #[tokio::test]
    async fn adding_twice_keeps_original_row() {
        let store = MemoryStore::default();
        let first = Utc::now() - Duration::hours(1);

        assert!(store.add(&entry("0xabc", "first", first)).await.unwrap());
        assert!(!store.add(&entry("0xabc", "second", Utc::now())).await.unwrap());

        let rows = store.blacklist_entries();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].reason, "first");
        assert_eq!(rows[0].listed_at, first);
    }

    #[tokio::test]
    async fn purge_respects_retention_window() {
        let store = MemoryStore::default();
        let now = Utc::now();
        store
            .add(&entry("0xold", "x", now - Duration::days(8)))
            .await
            .unwrap();
        store
            .add(&entry("0xrecent", "x", now - Duration::days(6)))
            .await
            .unwrap();

        let removed = purge_expired(&store, now, Duration::days(7)).await.unwrap();
        assert_eq!(removed, 1);

        let snapshot = store.snapshot().await.unwrap();
        assert!(!snapshot.contains(BlacklistKind::Coin, "0xold"));
        assert!(snapshot.contains(BlacklistKind::Coin, "0xrecent"));
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store = MemoryStore::default();
        let filters = FilterConfig {
            coin_blacklist: vec!["0xcoin".to_string()],
            dev_blacklist: vec!["0xdev".to_string()],
            ..FilterConfig::default()
        };

        assert_eq!(seed_from_config(&store, &filters).await.unwrap(), 2);
        assert_eq!(seed_from_config(&store, &filters).await.unwrap(), 0);

        let snapshot = store.snapshot().await.unwrap();
        assert!(snapshot.contains(BlacklistKind::Coin, "0xcoin"));
        assert!(snapshot.contains(BlacklistKind::Dev, "0xdev"));
        assert!(!snapshot.contains(BlacklistKind::Coin, "0xdev"));
    }

    #[tokio::test]
    async fn ban_reports_write_failures() {
        let store = MemoryStore::default();
        store.fail_writes(true);
        assert!(!ban(&store, "0xabc", BlacklistKind::Dev, "Bundled supply").await);
        store.fail_writes(false);
        assert!(ban(&store, "0xabc", BlacklistKind::Dev, "Bundled supply").await);
    }
}
