use chrono::{DateTime, Utc};

use super::address::Address;

/// Sentinel stored when a contract's deployer could not be resolved.
pub const UNKNOWN_CREATOR: &str = "Unknown";

/// Deployer of a pair's base token, as far as the explorer could tell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CreatorAddress {
    Known(Address),
    Unknown,
}

impl CreatorAddress {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(addr) => addr.as_str(),
            Self::Unknown => UNKNOWN_CREATOR,
        }
    }

    pub fn known(&self) -> Option<&Address> {
        match self {
            Self::Known(addr) => Some(addr),
            Self::Unknown => None,
        }
    }
}

/// A decoded pair that has not been enriched with its creator yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PairCandidate {
    pub pair_address: Address,
    pub base_token_name: String,
    pub base_token_address: Address,
    pub quote_token_address: Address,
    pub price: f64,
    pub liquidity: f64,
    pub volume_24h: f64,
    pub chain: String,
    pub exchange: String,
    pub created_at: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

impl PairCandidate {
    pub fn with_creator(self, creator_address: CreatorAddress) -> Pair {
        Pair {
            pair_address: self.pair_address,
            base_token_name: self.base_token_name,
            base_token_address: self.base_token_address,
            quote_token_address: self.quote_token_address,
            price: self.price,
            liquidity: self.liquidity,
            volume_24h: self.volume_24h,
            chain: self.chain,
            exchange: self.exchange,
            created_at: self.created_at,
            timestamp: self.timestamp,
            creator_address,
        }
    }
}

/// One observed DEX trading pair, ready for filtering and persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub pair_address: Address,
    pub base_token_name: String,
    pub base_token_address: Address,
    pub quote_token_address: Address,
    pub price: f64,
    pub liquidity: f64,
    pub volume_24h: f64,
    pub chain: String,
    pub exchange: String,
    pub created_at: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
    pub creator_address: CreatorAddress,
}

impl Pair {
    /// Numeric features fed to the anomaly detector, in fixed order.
    pub fn features(&self) -> [f64; 3] {
        [self.price, self.liquidity, self.volume_24h]
    }
}

/// Why a raw record was dropped during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    NotAnObject,
    InvalidPairAddress,
    InvalidBaseToken,
    InvalidQuoteToken,
    MissingName,
    InvalidPrice,
    InvalidLiquidity,
    InvalidVolume,
    MissingChain,
    ChainNotWhitelisted,
    MissingExchange,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAnObject => "not_an_object",
            Self::InvalidPairAddress => "invalid_pair_address",
            Self::InvalidBaseToken => "invalid_base_token",
            Self::InvalidQuoteToken => "invalid_quote_token",
            Self::MissingName => "missing_name",
            Self::InvalidPrice => "invalid_price",
            Self::InvalidLiquidity => "invalid_liquidity",
            Self::InvalidVolume => "invalid_volume",
            Self::MissingChain => "missing_chain",
            Self::ChainNotWhitelisted => "chain_not_whitelisted",
            Self::MissingExchange => "missing_exchange",
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::ingest::address::validate;

    /// A 42-char EVM address built from a single repeated hex digit.
    pub fn addr(digit: char) -> Address {
        validate(&format!("0x{}", digit.to_string().repeat(40))).unwrap()
    }

    /// A distinct 42-char EVM address per index.
    pub fn addr_n(n: usize) -> Address {
        validate(&format!("0x{:040x}", n)).unwrap()
    }

    /// A pair with the given features and index-derived addresses.
    pub fn pair_with(n: usize, price: f64, liquidity: f64, volume_24h: f64) -> Pair {
        Pair {
            pair_address: addr_n(n),
            base_token_address: addr_n(n + 1_000_000),
            price,
            liquidity,
            volume_24h,
            ..pair('1', '2', &format!("tok{}", n))
        }
    }

    pub fn pair(pair_digit: char, base_digit: char, name: &str) -> Pair {
        Pair {
            pair_address: addr(pair_digit),
            base_token_name: name.to_lowercase(),
            base_token_address: addr(base_digit),
            quote_token_address: addr('e'),
            price: 1.0,
            liquidity: 10_000.0,
            volume_24h: 5_000.0,
            chain: "ethereum".to_string(),
            exchange: "uniswap".to_string(),
            created_at: None,
            timestamp: Utc::now(),
            creator_address: CreatorAddress::Unknown,
        }
    }
}
