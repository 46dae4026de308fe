use std::collections::HashSet;

use crate::config::FilterConfig;
use crate::ingest::types::Pair;

use super::types::{BlacklistKind, BlacklistSnapshot};

/// Counts of pairs removed by each pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterStats {
    pub blacklisted: usize,
    pub denylisted_symbol: usize,
    pub low_liquidity: usize,
}

/// Removes pairs that are blacklisted, carry a denylisted name, or lack liquidity.
#[derive(Debug, Clone)]
pub struct FilterEngine {
    symbol_denylist: HashSet<String>,
    min_liquidity: f64,
}

impl FilterEngine {
    pub fn new(config: &FilterConfig) -> Self {
        let symbol_denylist = config
            .coin_blacklist
            .iter()
            .chain(config.symbol_denylist.iter())
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            symbol_denylist,
            min_liquidity: config.min_liquidity,
        }
    }

    /// Apply all passes against a blacklist snapshot taken this cycle.
    pub fn apply(&self, pairs: Vec<Pair>, snapshot: &BlacklistSnapshot) -> (Vec<Pair>, FilterStats) {
        let mut stats = FilterStats::default();

        let kept = pairs
            .into_iter()
            .filter(|pair| {
                if is_blacklisted(pair, snapshot) {
                    stats.blacklisted += 1;
                    return false;
                }
                if self
                    .symbol_denylist
                    .contains(&pair.base_token_name.to_lowercase())
                {
                    stats.denylisted_symbol += 1;
                    return false;
                }
                if pair.liquidity < self.min_liquidity {
                    stats.low_liquidity += 1;
                    return false;
                }
                true
            })
            .collect();

        (kept, stats)
    }
}

fn is_blacklisted(pair: &Pair, snapshot: &BlacklistSnapshot) -> bool {
    snapshot.contains(BlacklistKind::Coin, pair.base_token_address.as_str())
        || snapshot.contains(BlacklistKind::Coin, pair.pair_address.as_str())
        || pair
            .creator_address
            .known()
            .is_some_and(|creator| snapshot.contains(BlacklistKind::Dev, creator.as_str()))
}
