use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub honeypot: HoneypotConfig,
    #[serde(default)]
    pub anomaly_detection: AnomalyDetectionConfig,
    #[serde(default)]
    pub blacklist: BlacklistConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

// ============================================================
// Filters
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct FilterConfig {
    #[serde(default = "default_min_liquidity")]
    pub min_liquidity: f64,
    #[serde(default)]
    pub coin_blacklist: Vec<String>,
    #[serde(default)]
    pub dev_blacklist: Vec<String>,
    #[serde(default = "default_chain_whitelist")]
    pub chain_whitelist: Vec<String>,
    /// Extra token names rejected by the symbol pass, on top of `coin_blacklist`.
    #[serde(default)]
    pub symbol_denylist: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_liquidity: default_min_liquidity(),
            coin_blacklist: Vec::new(),
            dev_blacklist: Vec::new(),
            chain_whitelist: default_chain_whitelist(),
            symbol_denylist: Vec::new(),
        }
    }
}

fn default_min_liquidity() -> f64 {
    5000.0
}

fn default_chain_whitelist() -> Vec<String> {
    vec![
        "ethereum".to_string(),
        "bsc".to_string(),
        "polygon".to_string(),
    ]
}

// ============================================================
// Chains
// ============================================================

/// Per-chain explorer endpoint and identifiers.
#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub explorer_url: String,
    pub api_key: Option<String>,
    /// Environment variable holding the explorer API key. Resolved once at load.
    pub api_key_env: Option<String>,
}

/// Lookup table of configured chains, keyed by lowercased name.
#[derive(Debug, Clone, Default)]
pub struct ChainTable {
    by_name: HashMap<String, ChainConfig>,
}

impl ChainTable {
    pub fn new(chains: &[ChainConfig]) -> Self {
        let by_name = chains
            .iter()
            .map(|c| (c.name.to_lowercase(), c.clone()))
            .collect();
        Self { by_name }
    }

    pub fn get(&self, chain: &str) -> Option<&ChainConfig> {
        self.by_name.get(&chain.to_lowercase())
    }
}

// ============================================================
// External services
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct MarketDataConfig {
    #[serde(default = "default_search_url")]
    pub search_url: String,
    #[serde(default = "default_result_limit")]
    pub result_limit: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_rate_limit_backoff_secs")]
    pub rate_limit_backoff_secs: u64,
    #[serde(default = "default_inter_chain_delay_ms")]
    pub inter_chain_delay_ms: u64,
    /// Unbounded when unset: a rate-limited chain is retried until it answers.
    pub max_rate_limit_retries: Option<u32>,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            result_limit: default_result_limit(),
            timeout_secs: default_timeout_secs(),
            rate_limit_backoff_secs: default_rate_limit_backoff_secs(),
            inter_chain_delay_ms: default_inter_chain_delay_ms(),
            max_rate_limit_retries: None,
        }
    }
}

fn default_search_url() -> String {
    "https://api.dexscreener.com/latest/dex/search".to_string()
}

fn default_result_limit() -> u32 {
    500
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_rate_limit_backoff_secs() -> u64 {
    60
}

fn default_inter_chain_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct HoneypotConfig {
    #[serde(default = "default_honeypot_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HoneypotConfig {
    fn default() -> Self {
        Self {
            url: default_honeypot_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_honeypot_url() -> String {
    "https://api.honeypot.is/v2/IsHoneypot".to_string()
}

// ============================================================
// Anomaly Detection Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct AnomalyDetectionConfig {
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    #[serde(default = "default_contamination")]
    pub contamination: f64,
    #[serde(default = "default_corpus_cap")]
    pub corpus_cap: usize,
    pub seed: Option<u64>,
}

impl Default for AnomalyDetectionConfig {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            max_samples: default_max_samples(),
            contamination: default_contamination(),
            corpus_cap: default_corpus_cap(),
            seed: None,
        }
    }
}

fn default_n_estimators() -> usize {
    100
}

fn default_max_samples() -> usize {
    256
}

fn default_contamination() -> f64 {
    0.01
}

fn default_corpus_cap() -> usize {
    100_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct BlacklistConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

fn default_retention_days() -> i64 {
    7
}

// ============================================================
// Trading Config
// ============================================================

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TradeMode {
    #[default]
    Test,
    Production,
}

impl TradeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Production => "production",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TradingConfig {
    #[serde(default)]
    pub mode: TradeMode,
    #[serde(default = "default_quote_suffix")]
    pub quote_suffix: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default = "default_test_base_url")]
    pub test_base_url: String,
    #[serde(default = "default_production_base_url")]
    pub production_base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_api_secret_env")]
    pub api_secret_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            mode: TradeMode::Test,
            quote_suffix: default_quote_suffix(),
            quantity: default_quantity(),
            test_base_url: default_test_base_url(),
            production_base_url: default_production_base_url(),
            api_key_env: default_api_key_env(),
            api_secret_env: default_api_secret_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TradingConfig {
    /// Venue endpoint for the configured mode.
    pub fn base_url(&self) -> &str {
        match self.mode {
            TradeMode::Test => &self.test_base_url,
            TradeMode::Production => &self.production_base_url,
        }
    }
}

fn default_quote_suffix() -> String {
    "USDT".to_string()
}

fn default_quantity() -> f64 {
    10.0
}

fn default_test_base_url() -> String {
    "https://testnet.binance.vision".to_string()
}

fn default_production_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_api_key_env() -> String {
    "BINANCE_API_KEY".to_string()
}

fn default_api_secret_env() -> String {
    "BINANCE_API_SECRET".to_string()
}

/// Venue credentials, read from the environment at startup.
#[derive(Clone)]
pub struct TradingCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for TradingCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingCredentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl TradingCredentials {
    pub fn from_env(config: &TradingConfig) -> eyre::Result<Self> {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| eyre::eyre!("Missing trading credential: ${} is not set", name))
        };
        Ok(Self {
            api_key: read(&config.api_key_env)?,
            api_secret: read(&config.api_secret_env)?,
        })
    }
}

// ============================================================
// Orchestrator Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct OrchestratorConfig {
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
    #[serde(default = "default_diagnostics_path")]
    pub diagnostics_path: String,
    #[serde(default = "default_creator_cache_capacity")]
    pub creator_cache_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval_secs(),
            diagnostics_path: default_diagnostics_path(),
            creator_cache_capacity: default_creator_cache_capacity(),
        }
    }
}

fn default_cycle_interval_secs() -> u64 {
    60
}

fn default_diagnostics_path() -> String {
    "training_evolution.png".to_string()
}

fn default_creator_cache_capacity() -> usize {
    10_000
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.resolve_secrets();
        config.validate()?;
        Ok(config)
    }

    /// Fill explorer API keys from the environment where only `api_key_env` is given.
    fn resolve_secrets(&mut self) {
        for chain in &mut self.chains {
            if chain.api_key.is_some() {
                continue;
            }
            if let Some(var) = &chain.api_key_env {
                chain.api_key = std::env::var(var).ok().filter(|k| !k.trim().is_empty());
                if chain.api_key.is_none() {
                    tracing::warn!(
                        chain = %chain.name,
                        env = %var,
                        "Explorer API key not set, creator and supply lookups will degrade"
                    );
                }
            }
        }
    }

    pub fn chain_table(&self) -> ChainTable {
        ChainTable::new(&self.chains)
    }

    fn validate(&self) -> eyre::Result<()> {
        if self.filters.chain_whitelist.is_empty() {
            return Err(eyre::eyre!("At least one chain must be whitelisted"));
        }
        for chain in &self.chains {
            if chain.explorer_url.trim().is_empty() {
                return Err(eyre::eyre!(
                    "Chain '{}' must have an explorer_url configured",
                    chain.name
                ));
            }
        }
        if self.filters.min_liquidity < 0.0 {
            return Err(eyre::eyre!("filters.min_liquidity must be non-negative"));
        }

        let anomaly = &self.anomaly_detection;
        if !(anomaly.contamination > 0.0 && anomaly.contamination <= 0.5) {
            return Err(eyre::eyre!(
                "anomaly_detection.contamination must be in (0, 0.5], got {}",
                anomaly.contamination
            ));
        }
        if anomaly.n_estimators == 0 || anomaly.max_samples == 0 || anomaly.corpus_cap == 0 {
            return Err(eyre::eyre!(
                "anomaly_detection n_estimators, max_samples and corpus_cap must be positive"
            ));
        }
        if self.blacklist.retention_days <= 0 {
            return Err(eyre::eyre!("blacklist.retention_days must be positive"));
        }
        if self.trading.quantity <= 0.0 {
            return Err(eyre::eyre!("trading.quantity must be positive"));
        }
        if !self.orchestrator.diagnostics_path.ends_with(".png") {
            return Err(eyre::eyre!(
                "orchestrator.diagnostics_path must be a .png file, got {}",
                self.orchestrator.diagnostics_path
            ));
        }
        Ok(())
    }
}
