use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::anomaly::engine::AnomalyDetector;
use crate::blacklist::filter::FilterEngine;
use crate::blacklist::store::{self, BlacklistStore};
use crate::config::Config;
use crate::db::PairStore;
use crate::ingest::fetcher::{sleep_or_cancel, MarketDataFetcher};
use crate::ingest::normalizer::Normalizer;
use crate::risk::honeypot::{self, HoneypotCheck};
use crate::risk::responder::{ResponseSummary, RiskResponder};

/// What one cycle did, for logging.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleReport {
    pub fetched: usize,
    pub normalized: usize,
    pub filtered: usize,
    pub honeypot_safe: usize,
    pub anomalies: usize,
    pub persisted: u64,
    pub response: ResponseSummary,
    pub retrained: bool,
    pub purged: u64,
}

/// The collaborators a cycle runs through, in pipeline order.
pub struct Components {
    pub fetcher: MarketDataFetcher,
    pub normalizer: Normalizer,
    pub filter: FilterEngine,
    pub honeypot: Box<dyn HoneypotCheck>,
    pub detector: AnomalyDetector,
    pub responder: RiskResponder,
    pub blacklist: Arc<dyn BlacklistStore>,
    pub pairs: Arc<dyn PairStore>,
}

/// Drives the fetch, filter, detect and respond cycle until shutdown.
///
/// Cycles run strictly one after another. A failing or panicking cycle is
/// logged and the loop moves on after the usual sleep. Cancellation is
/// checked between phases and during every sleep; on the way out the
/// diagnostic history is flushed once more.
pub struct Orchestrator {
    fetcher: MarketDataFetcher,
    normalizer: Normalizer,
    filter: FilterEngine,
    honeypot: Box<dyn HoneypotCheck>,
    detector: AnomalyDetector,
    responder: RiskResponder,
    blacklist: Arc<dyn BlacklistStore>,
    pairs: Arc<dyn PairStore>,
    cycle_interval: Duration,
    diagnostics_path: PathBuf,
    retention: chrono::Duration,
    cycle: u64,
}

impl Orchestrator {
    pub fn new(components: Components, config: &Config) -> Self {
        Self {
            fetcher: components.fetcher,
            normalizer: components.normalizer,
            filter: components.filter,
            honeypot: components.honeypot,
            detector: components.detector,
            responder: components.responder,
            blacklist: components.blacklist,
            pairs: components.pairs,
            cycle_interval: Duration::from_secs(config.orchestrator.cycle_interval_secs),
            diagnostics_path: PathBuf::from(&config.orchestrator.diagnostics_path),
            retention: chrono::Duration::days(config.blacklist.retention_days),
            cycle: 0,
        }
    }

    pub async fn run(&mut self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.cycle_interval.as_secs(),
            "Screener loop started"
        );

        while !shutdown.is_cancelled() {
            let outcome = AssertUnwindSafe(self.run_cycle(&shutdown))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(report)) => tracing::info!(
                    cycle = self.cycle,
                    fetched = report.fetched,
                    kept = report.filtered,
                    anomalies = report.anomalies,
                    persisted = report.persisted,
                    traded = report.response.traded,
                    blacklisted = report.response.blacklisted,
                    retrained = report.retrained,
                    "Cycle complete"
                ),
                Ok(Err(e)) => tracing::error!(cycle = self.cycle, error = ?e, "Cycle failed"),
                Err(panic) => tracing::error!(
                    cycle = self.cycle,
                    panic = %panic_message(panic.as_ref()),
                    "Cycle panicked"
                ),
            }

            if !sleep_or_cancel(self.cycle_interval, &shutdown).await {
                break;
            }
        }

        tracing::info!("Shutdown requested, flushing diagnostics");
        self.save_diagnostics();
    }

    /// One pass through the pipeline. Store errors abort the cycle.
    pub async fn run_cycle(&mut self, shutdown: &CancellationToken) -> eyre::Result<CycleReport> {
        self.cycle += 1;
        let mut report = CycleReport::default();

        let raw = self.fetcher.fetch(shutdown).await;
        report.fetched = raw.len();
        if shutdown.is_cancelled() {
            return Ok(report);
        }

        let pairs = self.normalizer.normalize(&raw).await;
        report.normalized = pairs.len();
        let snapshot = self.blacklist.snapshot().await?;
        let (pairs, stats) = self.filter.apply(pairs, &snapshot);
        report.filtered = pairs.len();
        tracing::info!(
            normalized = report.normalized,
            kept = report.filtered,
            blacklisted = stats.blacklisted,
            denylisted = stats.denylisted_symbol,
            low_liquidity = stats.low_liquidity,
            "Filtered pairs"
        );
        if shutdown.is_cancelled() {
            return Ok(report);
        }

        if pairs.is_empty() {
            tracing::info!("No pairs left after filtering");
        } else {
            self.process_batch(pairs, shutdown, &mut report).await?;
        }

        match store::purge_expired(self.blacklist.as_ref(), chrono::Utc::now(), self.retention)
            .await
        {
            Ok(removed) => report.purged = removed,
            Err(e) => tracing::error!(error = %e, "Error refreshing blacklists"),
        }

        Ok(report)
    }

    async fn process_batch(
        &mut self,
        pairs: Vec<crate::ingest::types::Pair>,
        shutdown: &CancellationToken,
        report: &mut CycleReport,
    ) -> eyre::Result<()> {
        let pairs = honeypot::retain_safe(self.honeypot.as_ref(), pairs).await;
        report.honeypot_safe = pairs.len();
        if shutdown.is_cancelled() {
            return Ok(());
        }
        if pairs.is_empty() {
            tracing::info!("No pairs left after honeypot check");
            self.detector.record_cycle(self.cycle, 0, None);
            self.save_diagnostics();
            return Ok(());
        }

        let flagged = self.detector.flag_batch(&pairs);
        report.anomalies = flagged.len();
        tracing::info!(anomalies = flagged.len(), "Detected anomalies");

        report.persisted = self.pairs.save_pairs(&pairs).await?;
        tracing::info!(rows = report.persisted, "Pairs stored");
        if shutdown.is_cancelled() {
            return Ok(());
        }

        let anomalies: Vec<_> = flagged.iter().map(|&i| pairs[i].clone()).collect();
        report.response = self
            .responder
            .respond(&anomalies, self.blacklist.as_ref())
            .await;

        let mean_score = self.detector.absorb(&pairs);
        report.retrained = mean_score.is_some();
        self.detector
            .record_cycle(self.cycle, anomalies.len(), mean_score);
        self.save_diagnostics();

        Ok(())
    }

    fn save_diagnostics(&self) {
        match self.detector.diagnostics().save(&self.diagnostics_path) {
            Ok(true) => tracing::debug!(path = %self.diagnostics_path.display(), "Diagnostics saved"),
            Ok(false) => {}
            Err(e) => tracing::error!(
                path = %self.diagnostics_path.display(),
                error = %e,
                "Failed to save diagnostics"
            ),
        }
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
