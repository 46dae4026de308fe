use crate::config::AnomalyDetectionConfig;
use crate::ingest::types::Pair;

use super::corpus::RollingCorpus;
use super::forest::{self, ForestParams, IsolationForest};
use super::types::{CycleDiagnostic, Diagnostics};

pub const FEATURES: usize = 3;

/// Flags outlier pairs per batch and keeps a long-lived model over the rolling corpus.
///
/// The per-batch flags always come from a forest fit on that batch alone.
/// The long-lived model is refit on the whole corpus once it reaches its cap
/// and only feeds the diagnostic history.
pub struct AnomalyDetector {
    params: ForestParams,
    corpus: RollingCorpus<FEATURES>,
    model: Option<IsolationForest<FEATURES>>,
    diagnostics: Diagnostics,
}

impl AnomalyDetector {
    pub fn new(config: &AnomalyDetectionConfig) -> Self {
        Self {
            params: ForestParams {
                n_estimators: config.n_estimators,
                max_samples: config.max_samples,
                contamination: config.contamination,
                seed: config.seed,
            },
            corpus: RollingCorpus::new(config.corpus_cap),
            model: None,
            diagnostics: Diagnostics::default(),
        }
    }

    /// Indices of the pairs a forest fit on this batch classifies as outliers.
    pub fn flag_batch(&self, pairs: &[Pair]) -> Vec<usize> {
        let rows = impute_median(pairs);
        forest::fit_predict(&rows, &self.params)
            .into_iter()
            .enumerate()
            .filter_map(|(i, outlier)| outlier.then_some(i))
            .collect()
    }

    /// Append the batch to the corpus and retrain when it is at capacity.
    /// Returns the long-lived model's mean decision score when a retrain ran.
    pub fn absorb(&mut self, pairs: &[Pair]) -> Option<f64> {
        self.corpus.extend(&impute_median(pairs));
        if !self.corpus.is_full() {
            return None;
        }

        let rows = self.corpus.to_vec();
        tracing::info!(rows = rows.len(), "Retraining anomaly model on full corpus");
        let model = IsolationForest::fit(&rows, &self.params)?;
        let scores = model.decision_function(&rows);
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        self.model = Some(model);
        Some(mean)
    }

    pub fn record_cycle(&mut self, cycle: u64, anomalies: usize, mean_score: Option<f64>) {
        self.diagnostics.push(CycleDiagnostic {
            cycle,
            anomalies,
            mean_score,
        });
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn corpus_len(&self) -> usize {
        self.corpus.len()
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }
}

/// Feature rows with non-finite values replaced by the batch column median.
fn impute_median(pairs: &[Pair]) -> Vec<[f64; FEATURES]> {
    let mut rows: Vec<[f64; FEATURES]> = pairs.iter().map(Pair::features).collect();

    for col in 0..FEATURES {
        if rows.iter().all(|r| r[col].is_finite()) {
            continue;
        }
        let finite: Vec<f64> = rows.iter().map(|r| r[col]).filter(|v| v.is_finite()).collect();
        let median = if finite.is_empty() {
            0.0
        } else {
            forest::percentile(&finite, 50.0)
        };
        for row in rows.iter_mut().filter(|r| !r[col].is_finite()) {
            row[col] = median;
        }
    }
    rows
}
