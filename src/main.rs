use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use dexwatch::anomaly::engine::AnomalyDetector;
use dexwatch::blacklist::filter::FilterEngine;
use dexwatch::blacklist::store::seed_from_config;
use dexwatch::config::{Config, TradingCredentials};
use dexwatch::db::PgStore;
use dexwatch::ingest::creator::ExplorerCreatorResolver;
use dexwatch::ingest::fetcher::{DexScreenerApi, MarketDataFetcher};
use dexwatch::ingest::normalizer::Normalizer;
use dexwatch::pipeline::{Components, Orchestrator};
use dexwatch::risk::honeypot::HoneypotApi;
use dexwatch::risk::responder::RiskResponder;
use dexwatch::risk::supply::{BundledSupplyCheck, RiskCheck};
use dexwatch::trading::binance::BinanceVenue;
use dexwatch::trading::executor::TradeExecutor;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    // Initialize structured logging (set RUST_LOG=debug for drop details)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    tracing::info!("DexWatch screener starting");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path)?;
    tracing::info!(
        chains = config.chains.len(),
        whitelist = ?config.filters.chain_whitelist,
        mode = config.trading.mode.as_str(),
        "Configuration loaded from {}",
        config_path
    );

    // Required in test mode too
    let credentials = TradingCredentials::from_env(&config.trading)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&config.database.url)
        .await
        .map_err(|e| eyre::eyre!("Failed to connect to database: {}", e))?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| eyre::eyre!("Failed to run migrations: {}", e))?;

    tracing::info!("Database migrations complete");

    let store = Arc::new(PgStore::new(pool));
    seed_from_config(store.as_ref(), &config.filters).await?;

    let chains = config.chain_table();
    let http_timeout = Duration::from_secs(config.market_data.timeout_secs);

    let fetcher = MarketDataFetcher::new(
        Box::new(DexScreenerApi::new(&config.market_data)?),
        config.filters.chain_whitelist.clone(),
        &config.market_data,
    );
    let creators = ExplorerCreatorResolver::new(
        chains.clone(),
        http_timeout,
        config.orchestrator.creator_cache_capacity,
    )?;
    let venue = BinanceVenue::new(&config.trading, credentials)?;
    let checks: Vec<Box<dyn RiskCheck>> =
        vec![Box::new(BundledSupplyCheck::new(chains.clone(), http_timeout)?)];
    let responder = RiskResponder::new(
        checks,
        TradeExecutor::new(&config.trading, Arc::new(venue)),
    );

    let components = Components {
        fetcher,
        normalizer: Normalizer::new(&config.filters.chain_whitelist, Arc::new(creators)),
        filter: FilterEngine::new(&config.filters),
        honeypot: Box::new(HoneypotApi::new(&config.honeypot, chains)?),
        detector: AnomalyDetector::new(&config.anomaly_detection),
        responder,
        blacklist: store.clone(),
        pairs: store,
    };
    let mut orchestrator = Orchestrator::new(components, &config);

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    orchestrator.run(shutdown).await;

    tracing::info!("DexWatch screener stopped gracefully");
    Ok(())
}

/// Cancel `shutdown` on Ctrl+C, or SIGTERM on unix.
async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM, Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received, finishing current phase...");
    shutdown.cancel();
}
