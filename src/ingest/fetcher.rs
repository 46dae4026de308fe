use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::MarketDataConfig;

/// Outcome of one search request against the aggregator.
#[derive(Debug)]
pub enum SearchOutcome {
    /// HTTP 200 with the raw `pairs` array (possibly empty).
    Pairs(Vec<Value>),
    /// HTTP 429.
    RateLimited,
    /// Any other status, with the response body for diagnostics.
    Failed { status: u16, body: String },
}

/// Aggregator search endpoint. Errors are network or decoding failures.
#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn search(&self, query: &str, limit: u32) -> eyre::Result<SearchOutcome>;
}

/// DexScreener `/latest/dex/search` client.
pub struct DexScreenerApi {
    client: reqwest::Client,
    search_url: String,
}

impl DexScreenerApi {
    pub fn new(config: &MarketDataConfig) -> eyre::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| eyre::eyre!("Failed to build market data HTTP client: {}", e))?;
        Ok(Self {
            client,
            search_url: config.search_url.clone(),
        })
    }
}

#[async_trait]
impl SearchApi for DexScreenerApi {
    async fn search(&self, query: &str, limit: u32) -> eyre::Result<SearchOutcome> {
        let resp = self
            .client
            .get(&self.search_url)
            .query(&[("q", query.to_string()), ("limit", limit.to_string())])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Ok(SearchOutcome::RateLimited);
        }
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Ok(SearchOutcome::Failed {
                status: status.as_u16(),
                body,
            });
        }

        let data: Value = resp.json().await?;
        let pairs = match data.get("pairs") {
            Some(Value::Array(pairs)) => pairs.clone(),
            _ => Vec::new(),
        };
        Ok(SearchOutcome::Pairs(pairs))
    }
}

/// Polls the aggregator once per whitelisted chain.
pub struct MarketDataFetcher {
    api: Box<dyn SearchApi>,
    chains: Vec<String>,
    limit: u32,
    rate_limit_backoff: Duration,
    inter_chain_delay: Duration,
    max_rate_limit_retries: Option<u32>,
}

impl MarketDataFetcher {
    pub fn new(api: Box<dyn SearchApi>, chains: Vec<String>, config: &MarketDataConfig) -> Self {
        Self {
            api,
            chains,
            limit: config.result_limit,
            rate_limit_backoff: Duration::from_secs(config.rate_limit_backoff_secs),
            inter_chain_delay: Duration::from_millis(config.inter_chain_delay_ms),
            max_rate_limit_retries: config.max_rate_limit_retries,
        }
    }

    /// Fetch raw pair payloads for every whitelisted chain.
    ///
    /// A rate-limited chain is retried after the backoff. Other bad statuses
    /// skip the chain. A network failure abandons the whole fetch and yields
    /// an empty batch.
    pub async fn fetch(&self, shutdown: &CancellationToken) -> Vec<Value> {
        match self.fetch_all(shutdown).await {
            Ok(pairs) => {
                tracing::info!(total = pairs.len(), "Total pairs fetched");
                pairs
            }
            Err(e) => {
                tracing::error!(error = %e, "Network error while fetching pairs");
                Vec::new()
            }
        }
    }

    async fn fetch_all(&self, shutdown: &CancellationToken) -> eyre::Result<Vec<Value>> {
        let mut all_pairs = Vec::new();

        for (idx, chain) in self.chains.iter().enumerate() {
            if shutdown.is_cancelled() {
                break;
            }
            if idx > 0 && !sleep_or_cancel(self.inter_chain_delay, shutdown).await {
                break;
            }

            tracing::info!(chain = %chain, "Fetching pairs");
            let mut rate_limited = 0u32;

            loop {
                match self.api.search(chain, self.limit).await? {
                    SearchOutcome::Pairs(pairs) => {
                        tracing::info!(chain = %chain, count = pairs.len(), "Found pairs");
                        all_pairs.extend(pairs);
                        break;
                    }
                    SearchOutcome::RateLimited => {
                        rate_limited += 1;
                        if let Some(max) = self.max_rate_limit_retries {
                            if rate_limited > max {
                                tracing::error!(
                                    chain = %chain,
                                    attempts = rate_limited,
                                    "Rate limit persisted, skipping chain"
                                );
                                break;
                            }
                        }
                        tracing::warn!(
                            chain = %chain,
                            backoff_secs = self.rate_limit_backoff.as_secs(),
                            "Rate limit hit, waiting before retry"
                        );
                        if !sleep_or_cancel(self.rate_limit_backoff, shutdown).await {
                            return Ok(all_pairs);
                        }
                    }
                    SearchOutcome::Failed { status, body } => {
                        tracing::error!(
                            chain = %chain,
                            status,
                            body = %body,
                            "Error fetching pairs, skipping chain"
                        );
                        break;
                    }
                }
            }
        }

        Ok(all_pairs)
    }
}

/// Sleep unless shutdown arrives first. Returns false when cancelled.
pub(crate) async fn sleep_or_cancel(duration: Duration, shutdown: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !shutdown.is_cancelled();
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown.cancelled() => false,
    }
}
