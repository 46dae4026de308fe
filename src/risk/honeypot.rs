use async_trait::async_trait;
use std::time::Duration;

use crate::config::{ChainTable, HoneypotConfig};
use crate::ingest::address::Address;
use crate::ingest::types::Pair;

/// Result of a honeypot check for one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoneypotVerdict {
    Clear,
    Honeypot,
    /// `isHoneypot` missing or not a boolean.
    Ambiguous,
    /// Transport or decode failure, already logged.
    Unreachable,
    /// No chain id is configured for the chain, so no check was made.
    Unsupported,
}

impl HoneypotVerdict {
    /// Whether the pair must be dropped. Only a clean answer or an
    /// unsupported chain lets it through.
    pub fn excludes(&self) -> bool {
        match self {
            Self::Clear | Self::Unsupported => false,
            Self::Honeypot | Self::Ambiguous | Self::Unreachable => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Honeypot => "honeypot",
            Self::Ambiguous => "ambiguous",
            Self::Unreachable => "unreachable",
            Self::Unsupported => "unsupported",
        }
    }
}

#[async_trait]
pub trait HoneypotCheck: Send + Sync {
    async fn check(&self, chain: &str, token: &Address) -> HoneypotVerdict;
}

/// Client for the honeypot.is `IsHoneypot` endpoint.
pub struct HoneypotApi {
    client: reqwest::Client,
    url: String,
    chains: ChainTable,
}

impl HoneypotApi {
    pub fn new(config: &HoneypotConfig, chains: ChainTable) -> eyre::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| eyre::eyre!("Failed to build honeypot HTTP client: {}", e))?;
        Ok(Self {
            client,
            url: config.url.clone(),
            chains,
        })
    }

    async fn query(&self, chain_id: u64, token: &Address) -> eyre::Result<serde_json::Value> {
        let resp = self
            .client
            .get(&self.url)
            .query(&[
                ("address", token.as_str().to_string()),
                ("chainId", chain_id.to_string()),
            ])
            .send()
            .await?;
        // Error statuses still carry a JSON body worth inspecting.
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl HoneypotCheck for HoneypotApi {
    async fn check(&self, chain: &str, token: &Address) -> HoneypotVerdict {
        let Some(chain_config) = self.chains.get(chain) else {
            return HoneypotVerdict::Unsupported;
        };

        match self.query(chain_config.chain_id, token).await {
            Ok(body) => match body.get("isHoneypot").and_then(|v| v.as_bool()) {
                Some(true) => HoneypotVerdict::Honeypot,
                Some(false) => HoneypotVerdict::Clear,
                None => HoneypotVerdict::Ambiguous,
            },
            Err(e) => {
                tracing::error!(chain = %chain, token = %token, error = %e, "Honeypot check error");
                HoneypotVerdict::Unreachable
            }
        }
    }
}

/// Drop every pair whose base token the checker does not clear.
pub async fn retain_safe(checker: &dyn HoneypotCheck, pairs: Vec<Pair>) -> Vec<Pair> {
    let before = pairs.len();
    let mut kept = Vec::with_capacity(before);

    for pair in pairs {
        let verdict = checker.check(&pair.chain, &pair.base_token_address).await;
        if verdict.excludes() {
            tracing::debug!(
                token = %pair.base_token_address,
                chain = %pair.chain,
                verdict = verdict.as_str(),
                "Pair excluded by honeypot check"
            );
            continue;
        }
        if verdict == HoneypotVerdict::Unsupported {
            tracing::debug!(chain = %pair.chain, "Honeypot check unsupported for chain, keeping pair");
        }
        kept.push(pair);
    }

    tracing::info!(
        before,
        after = kept.len(),
        "Filtered pairs after honeypot check"
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainConfig;
    use crate::ingest::types::fixtures::{addr, pair};
    use httpmock::prelude::*;

    fn api(server: &MockServer) -> HoneypotApi {
        let config = HoneypotConfig {
            url: server.url("/v2/IsHoneypot"),
            timeout_secs: 2,
        };
        let chains = ChainTable::new(&[ChainConfig {
            name: "ethereum".to_string(),
            chain_id: 1,
            explorer_url: "http://unused".to_string(),
            api_key: None,
            api_key_env: None,
        }]);
        HoneypotApi::new(&config, chains).unwrap()
    }

    #[tokio::test]
    async fn maps_response_field_to_verdict() {
        let server = MockServer::start();
        let honeypot = server.mock(|when, then| {
            when.method(GET)
                .path("/v2/IsHoneypot")
                .query_param("address", addr('1').as_str())
                .query_param("chainId", "1");
            then.status(200).json_body(serde_json::json!({ "isHoneypot": true }));
        });
        server.mock(|when, then| {
            when.method(GET).query_param("address", addr('2').as_str());
            then.status(200).json_body(serde_json::json!({ "isHoneypot": false }));
        });

        let api = api(&server);
        assert_eq!(api.check("ethereum", &addr('1')).await, HoneypotVerdict::Honeypot);
        assert_eq!(api.check("Ethereum", &addr('2')).await, HoneypotVerdict::Clear);
        honeypot.assert();
    }

    #[tokio::test]
    async fn missing_field_is_excluded() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v2/IsHoneypot");
            then.status(404).json_body(serde_json::json!({ "error": "token not found" }));
        });

        let verdict = api(&server).check("ethereum", &addr('3')).await;
        assert_eq!(verdict, HoneypotVerdict::Ambiguous);
        assert!(verdict.excludes());
    }

    #[tokio::test]
    async fn non_json_body_is_unreachable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v2/IsHoneypot");
            then.status(502).body("bad gateway");
        });

        let verdict = api(&server).check("ethereum", &addr('3')).await;
        assert!(matches!(verdict, HoneypotVerdict::Unreachable));
        assert!(verdict.excludes());
    }

    #[tokio::test]
    async fn unsupported_chain_is_retained() {
        let server = MockServer::start();
        let any = server.mock(|when, then| {
            when.method(GET);
            then.status(200).json_body(serde_json::json!({ "isHoneypot": true }));
        });

        let api = api(&server);
        let mut on_solana = pair('1', '2', "sol");
        on_solana.chain = "solana".to_string();
        let kept = retain_safe(&api, vec![on_solana]).await;

        assert_eq!(kept.len(), 1);
        any.assert_hits(0);
    }

    #[tokio::test]
    async fn retain_safe_drops_flagged_tokens_only() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).query_param("address", addr('2').as_str());
            then.status(200).json_body(serde_json::json!({ "isHoneypot": true }));
        });
        server.mock(|when, then| {
            when.method(GET).query_param("address", addr('4').as_str());
            then.status(200).json_body(serde_json::json!({ "isHoneypot": false }));
        });

        let kept = retain_safe(
            &api(&server),
            vec![pair('1', '2', "bad"), pair('3', '4', "good")],
        )
        .await;

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].base_token_name, "good");
    }
}
