use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Which list an address is banned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlacklistKind {
    Coin,
    Dev,
}

impl BlacklistKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coin => "coin",
            Self::Dev => "dev",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "coin" => Some(Self::Coin),
            "dev" => Some(Self::Dev),
            _ => None,
        }
    }
}

/// Reason recorded for entries seeded from configuration.
pub const PREDEFINED_REASON: &str = "Predefined blacklist";

/// A persisted blacklist row.
#[derive(Debug, Clone, PartialEq)]
pub struct BlacklistEntry {
    pub address: String,
    pub kind: BlacklistKind,
    pub reason: String,
    pub listed_at: DateTime<Utc>,
}

/// Point-in-time view of the blacklist, taken once per cycle.
#[derive(Debug, Clone, Default)]
pub struct BlacklistSnapshot {
    pub coins: HashSet<String>,
    pub devs: HashSet<String>,
}

impl BlacklistSnapshot {
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, BlacklistKind)>,
    {
        let mut snapshot = Self::default();
        for (address, kind) in entries {
            match kind {
                BlacklistKind::Coin => snapshot.coins.insert(address),
                BlacklistKind::Dev => snapshot.devs.insert(address),
            };
        }
        snapshot
    }

    pub fn contains(&self, kind: BlacklistKind, address: &str) -> bool {
        match kind {
            BlacklistKind::Coin => self.coins.contains(address),
            BlacklistKind::Dev => self.devs.contains(address),
        }
    }
}
