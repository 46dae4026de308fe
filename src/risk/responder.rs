use crate::blacklist::store::{self, BlacklistStore};
use crate::blacklist::types::BlacklistKind;
use crate::ingest::types::Pair;
use crate::trading::executor::{TradeExecutor, TradeOutcome};

use super::supply::{RiskCheck, RiskFinding};

/// Per-cycle tally of what the responder did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResponseSummary {
    pub flagged: usize,
    pub blacklisted: usize,
    pub traded: usize,
    pub trade_failures: usize,
}

/// Runs the risk checks over anomalous pairs, bans the risky ones and buys the rest.
pub struct RiskResponder {
    checks: Vec<Box<dyn RiskCheck>>,
    executor: TradeExecutor,
}

impl RiskResponder {
    pub fn new(checks: Vec<Box<dyn RiskCheck>>, executor: TradeExecutor) -> Self {
        Self { checks, executor }
    }

    pub async fn respond(
        &self,
        anomalies: &[Pair],
        blacklist: &dyn BlacklistStore,
    ) -> ResponseSummary {
        let mut summary = ResponseSummary::default();

        for pair in anomalies {
            if let Some((check, reason)) = self.first_flag(pair).await {
                summary.flagged += 1;
                tracing::warn!(
                    token = %pair.base_token_address,
                    chain = %pair.chain,
                    check,
                    reason = %reason,
                    "Anomalous pair failed risk check"
                );
                summary.blacklisted += self.ban_pair(pair, &reason, blacklist).await;
                continue;
            }

            match self.executor.place_buy(pair).await {
                TradeOutcome::Failed { .. } => summary.trade_failures += 1,
                TradeOutcome::Simulated { .. } | TradeOutcome::Placed(_) => summary.traded += 1,
            }
        }

        summary
    }

    async fn first_flag(&self, pair: &Pair) -> Option<(&'static str, String)> {
        for check in &self.checks {
            if let RiskFinding::Flagged { reason } = check.assess(pair).await {
                return Some((check.name(), reason));
            }
        }
        None
    }

    /// Ban the token and, when known, its creator. Returns successful writes.
    async fn ban_pair(&self, pair: &Pair, reason: &str, blacklist: &dyn BlacklistStore) -> usize {
        let mut written = 0;
        if store::ban(
            blacklist,
            pair.base_token_address.as_str(),
            BlacklistKind::Coin,
            reason,
        )
        .await
        {
            written += 1;
        }
        if let Some(creator) = pair.creator_address.known() {
            if store::ban(blacklist, creator.as_str(), BlacklistKind::Dev, reason).await {
                written += 1;
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blacklist::types::BlacklistEntry;
    use crate::config::{TradeMode, TradingConfig};
    use crate::db::memory::MemoryStore;
    use crate::ingest::types::fixtures::{addr, pair};
    use crate::ingest::types::CreatorAddress;
    use crate::risk::supply::BUNDLED_SUPPLY_REASON;
    use crate::trading::executor::fakes::RecordingVenue;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Arc;

    /// Flags every pair whose base token name is in the set.
    struct FlagNames(HashSet<&'static str>);

    #[async_trait]
    impl RiskCheck for FlagNames {
        fn name(&self) -> &'static str {
            "flag_names"
        }

        async fn assess(&self, pair: &Pair) -> RiskFinding {
            if self.0.contains(pair.base_token_name.as_str()) {
                RiskFinding::Flagged {
                    reason: BUNDLED_SUPPLY_REASON.to_string(),
                }
            } else {
                RiskFinding::Clear
            }
        }
    }

    fn responder(flag: &[&'static str], venue: Arc<RecordingVenue>) -> RiskResponder {
        let executor = TradeExecutor::new(
            &TradingConfig {
                mode: TradeMode::Production,
                ..TradingConfig::default()
            },
            venue,
        );
        let checks: Vec<Box<dyn RiskCheck>> =
            vec![Box::new(FlagNames(flag.iter().copied().collect()))];
        RiskResponder::new(checks, executor)
    }

    fn addresses(entries: &[BlacklistEntry]) -> HashSet<String> {
        entries.iter().map(|e| e.address.clone()).collect()
    }

    #[tokio::test]
    async fn flagged_pair_bans_token_and_creator_without_trading() {
        let venue = Arc::new(RecordingVenue::default());
        let store = MemoryStore::default();
        let mut flagged = pair('1', '2', "rug");
        flagged.creator_address = CreatorAddress::Known(addr('c'));

        let summary = responder(&["rug"], venue.clone())
            .respond(&[flagged], &store)
            .await;

        assert_eq!(summary.flagged, 1);
        assert_eq!(summary.blacklisted, 2);
        assert_eq!(summary.traded, 0);
        assert!(venue.orders.lock().unwrap().is_empty());

        let entries = store.blacklist_entries();
        assert_eq!(
            addresses(&entries),
            HashSet::from([addr('2').to_string(), addr('c').to_string()])
        );
        assert!(entries.iter().all(|e| e.reason == BUNDLED_SUPPLY_REASON));
    }

    #[tokio::test]
    async fn unknown_creator_is_not_banned() {
        let store = MemoryStore::default();
        responder(&["rug"], Arc::new(RecordingVenue::default()))
            .respond(&[pair('1', '2', "rug")], &store)
            .await;

        let entries = store.blacklist_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, BlacklistKind::Coin);
    }

    #[tokio::test]
    async fn clear_pairs_are_traded() {
        let venue = Arc::new(RecordingVenue::default());
        let store = MemoryStore::default();

        let summary = responder(&["rug"], venue.clone())
            .respond(&[pair('1', '2', "moon"), pair('3', '4', "rug")], &store)
            .await;

        assert_eq!(summary.traded, 1);
        assert_eq!(summary.flagged, 1);
        assert_eq!(
            *venue.orders.lock().unwrap(),
            vec![("MOONUSDT".to_string(), 10.0)]
        );
    }

    #[tokio::test]
    async fn blacklist_write_failure_does_not_stop_the_batch() {
        let venue = Arc::new(RecordingVenue::default());
        let store = MemoryStore::default();
        store.fail_writes(true);

        let summary = responder(&["rug"], venue.clone())
            .respond(&[pair('1', '2', "rug"), pair('3', '4', "moon")], &store)
            .await;

        assert_eq!(summary.blacklisted, 0);
        assert_eq!(summary.traded, 1);
    }
}
