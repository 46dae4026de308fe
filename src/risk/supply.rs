use alloy::primitives::{address, U256};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::ChainTable;
use crate::ingest::types::Pair;

/// Outcome of a single risk check on an anomalous pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskFinding {
    Clear,
    Flagged { reason: String },
}

/// A pluggable check run against each anomalous pair before trading.
#[async_trait]
pub trait RiskCheck: Send + Sync {
    fn name(&self) -> &'static str;

    /// Never fails: a check that cannot decide reports `Clear`.
    async fn assess(&self, pair: &Pair) -> RiskFinding;
}

pub const BUNDLED_SUPPLY_REASON: &str = "Bundled supply";

const BURN_ADDRESS: alloy::primitives::Address =
    address!("0x000000000000000000000000000000000000dEaD");

#[derive(Debug, Deserialize)]
struct TokenBalanceResponse {
    result: Option<serde_json::Value>,
}

/// Flags tokens whose burn address holds a non-zero balance, read through
/// the chain's block explorer.
pub struct BundledSupplyCheck {
    client: reqwest::Client,
    chains: ChainTable,
}

impl BundledSupplyCheck {
    pub fn new(chains: ChainTable, timeout: Duration) -> eyre::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| eyre::eyre!("Failed to build explorer HTTP client: {}", e))?;
        Ok(Self { client, chains })
    }

    async fn burn_balance(&self, url: &str, api_key: &str, token: &str) -> eyre::Result<U256> {
        let burn = BURN_ADDRESS.to_string();
        let resp = self
            .client
            .get(url)
            .query(&[
                ("module", "account"),
                ("action", "tokenbalance"),
                ("contractaddress", token),
                ("address", burn.as_str()),
                ("tag", "latest"),
                ("apikey", api_key),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: TokenBalanceResponse = resp.json().await?;
        parse_balance(body.result.as_ref())
    }
}

fn parse_balance(result: Option<&serde_json::Value>) -> eyre::Result<U256> {
    match result {
        None | Some(serde_json::Value::Null) => Ok(U256::ZERO),
        Some(serde_json::Value::String(s)) => U256::from_str_radix(s.trim(), 10)
            .map_err(|e| eyre::eyre!("Unparseable token balance {:?}: {}", s, e)),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| eyre::eyre!("Unparseable token balance {}", n)),
        Some(other) => Err(eyre::eyre!("Unexpected token balance value {}", other)),
    }
}

#[async_trait]
impl RiskCheck for BundledSupplyCheck {
    fn name(&self) -> &'static str {
        "bundled_supply"
    }

    async fn assess(&self, pair: &Pair) -> RiskFinding {
        let chain = pair.chain.as_str();
        let Some(chain_config) = self.chains.get(chain) else {
            tracing::warn!(chain = %chain, "Unsupported chain for supply check");
            return RiskFinding::Clear;
        };
        let Some(api_key) = chain_config.api_key.as_deref() else {
            tracing::warn!(chain = %chain, "Missing explorer API key for supply check");
            return RiskFinding::Clear;
        };

        match self
            .burn_balance(
                &chain_config.explorer_url,
                api_key,
                pair.base_token_address.as_str(),
            )
            .await
        {
            Ok(balance) if !balance.is_zero() => {
                tracing::info!(
                    token = %pair.base_token_address,
                    chain = %chain,
                    balance = %balance,
                    "Bundled supply detected"
                );
                RiskFinding::Flagged {
                    reason: BUNDLED_SUPPLY_REASON.to_string(),
                }
            }
            Ok(_) => RiskFinding::Clear,
            Err(e) => {
                tracing::warn!(
                    token = %pair.base_token_address,
                    chain = %chain,
                    error = %e,
                    "Supply check failed, treating as clear"
                );
                RiskFinding::Clear
            }
        }
    }
}
