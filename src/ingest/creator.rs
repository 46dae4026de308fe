use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::ChainTable;

use super::address::{self, Address};
use super::types::CreatorAddress;

/// Resolves the deployer of a token contract. Never fails: anything short of
/// a clean answer is [`CreatorAddress::Unknown`].
#[async_trait]
pub trait CreatorLookup: Send + Sync {
    async fn creator_of(&self, chain: &str, contract: &Address) -> CreatorAddress;
}

/// Bounded memo of resolved creators with first-in-first-out eviction.
#[derive(Debug)]
pub struct CreatorMemo {
    capacity: usize,
    entries: HashMap<(String, Address), Address>,
    order: VecDeque<(String, Address)>,
}

impl CreatorMemo {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, chain: &str, contract: &Address) -> Option<&Address> {
        self.entries.get(&(chain.to_string(), contract.clone()))
    }

    pub fn insert(&mut self, chain: &str, contract: Address, creator: Address) {
        if self.capacity == 0 {
            return;
        }
        let key = (chain.to_string(), contract);
        if self.entries.insert(key.clone(), creator).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct ExplorerEnvelope {
    status: Option<String>,
    result: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ContractCreation {
    #[serde(rename = "contractCreator")]
    contract_creator: Option<String>,
}

/// Etherscan-family `getcontractcreation` client, one explorer per chain.
pub struct ExplorerCreatorResolver {
    client: reqwest::Client,
    chains: ChainTable,
    memo: Mutex<CreatorMemo>,
}

impl ExplorerCreatorResolver {
    pub fn new(chains: ChainTable, timeout: Duration, memo_capacity: usize) -> eyre::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| eyre::eyre!("Failed to build explorer HTTP client: {}", e))?;
        Ok(Self {
            client,
            chains,
            memo: Mutex::new(CreatorMemo::new(memo_capacity)),
        })
    }

    async fn query_explorer(
        &self,
        url: &str,
        api_key: &str,
        contract: &Address,
    ) -> eyre::Result<Option<Address>> {
        let resp = self
            .client
            .get(url)
            .query(&[
                ("module", "contract"),
                ("action", "getcontractcreation"),
                ("contractaddresses", contract.as_str()),
                ("apikey", api_key),
            ])
            .send()
            .await?;

        if resp.status() != reqwest::StatusCode::OK {
            return Ok(None);
        }

        let envelope: ExplorerEnvelope = resp.json().await?;
        if envelope.status.as_deref() != Some("1") {
            return Ok(None);
        }
        let creations: Vec<ContractCreation> = match envelope.result {
            Some(result @ serde_json::Value::Array(_)) => serde_json::from_value(result)?,
            _ => return Ok(None),
        };

        Ok(creations
            .into_iter()
            .next()
            .and_then(|c| c.contract_creator)
            .and_then(|raw| address::validate(&raw)))
    }
}

#[async_trait]
impl CreatorLookup for ExplorerCreatorResolver {
    async fn creator_of(&self, chain: &str, contract: &Address) -> CreatorAddress {
        let chain = chain.to_lowercase();
        let Some(chain_config) = self.chains.get(&chain) else {
            tracing::warn!(chain = %chain, "Unsupported chain for contract lookup");
            return CreatorAddress::Unknown;
        };
        let Some(api_key) = chain_config.api_key.as_deref() else {
            tracing::debug!(chain = %chain, "No explorer API key, creator left unknown");
            return CreatorAddress::Unknown;
        };

        if let Some(hit) = self.memo.lock().await.get(&chain, contract) {
            return CreatorAddress::Known(hit.clone());
        }

        match self
            .query_explorer(&chain_config.explorer_url, api_key, contract)
            .await
        {
            Ok(Some(creator)) => {
                self.memo
                    .lock()
                    .await
                    .insert(&chain, contract.clone(), creator.clone());
                CreatorAddress::Known(creator)
            }
            Ok(None) => CreatorAddress::Unknown,
            Err(e) => {
                tracing::error!(
                    chain = %chain,
                    contract = %contract,
                    error = %e,
                    "Creator fetch error"
                );
                CreatorAddress::Unknown
            }
        }
    }
}
