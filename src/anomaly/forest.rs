use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Fitting parameters for [`IsolationForest`].
#[derive(Debug, Clone)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: Option<u64>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.01,
            seed: None,
        }
    }
}

impl ForestParams {
    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Ensemble of isolation trees over fixed-width feature rows.
///
/// Points that random axis-aligned splits isolate quickly get short average
/// path lengths and therefore low scores. `offset` is the contamination
/// quantile of the training scores, so roughly `contamination` of the
/// training rows fall below zero in [`IsolationForest::decision_function`].
#[derive(Debug)]
pub struct IsolationForest<const N: usize> {
    trees: Vec<Node>,
    sample_size: usize,
    offset: f64,
}

impl<const N: usize> IsolationForest<N> {
    /// Fit on `data`. Needs at least two rows.
    pub fn fit(data: &[[f64; N]], params: &ForestParams) -> Option<Self> {
        if data.len() < 2 || params.n_estimators == 0 {
            return None;
        }

        let mut rng = params.rng();
        let sample_size = params.max_samples.clamp(2, data.len());
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        let trees = (0..params.n_estimators)
            .map(|_| {
                let mut sample: Vec<&[f64; N]> = index::sample(&mut rng, data.len(), sample_size)
                    .into_iter()
                    .map(|i| &data[i])
                    .collect();
                grow(&mut sample, 0, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            offset: 0.0,
        };
        let scores = forest.score_samples(data);
        forest.offset = percentile(&scores, params.contamination * 100.0);
        Some(forest)
    }

    /// Opposite of the anomaly score: lower means more abnormal, in [-1, 0).
    pub fn score_samples(&self, data: &[[f64; N]]) -> Vec<f64> {
        let norm = average_path_length(self.sample_size);
        data.iter()
            .map(|row| {
                let mean_depth = self
                    .trees
                    .iter()
                    .map(|tree| path_length(tree, row, 0))
                    .sum::<f64>()
                    / self.trees.len() as f64;
                -(2f64.powf(-mean_depth / norm))
            })
            .collect()
    }

    /// Shifted scores: negative values are outliers.
    pub fn decision_function(&self, data: &[[f64; N]]) -> Vec<f64> {
        self.score_samples(data)
            .into_iter()
            .map(|s| s - self.offset)
            .collect()
    }

    /// `true` for rows classified as outliers.
    pub fn predict(&self, data: &[[f64; N]]) -> Vec<bool> {
        self.decision_function(data)
            .into_iter()
            .map(|d| d < 0.0)
            .collect()
    }
}

/// Fit on `data` and classify the same rows in one go.
pub fn fit_predict<const N: usize>(data: &[[f64; N]], params: &ForestParams) -> Vec<bool> {
    match IsolationForest::fit(data, params) {
        Some(forest) => forest.predict(data),
        None => vec![false; data.len()],
    }
}

fn grow<const N: usize>(
    sample: &mut [&[f64; N]],
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= max_depth || sample.len() <= 1 {
        return Node::Leaf { size: sample.len() };
    }

    let mut features: [usize; N] = std::array::from_fn(|i| i);
    features.shuffle(rng);

    for feature in features {
        let (min, max) = sample.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), row| {
            (lo.min(row[feature]), hi.max(row[feature]))
        });
        if !(min < max) {
            continue;
        }

        let threshold = rng.gen_range(min..max);
        let split = partition(sample, |row| row[feature] <= threshold);
        let (left, right) = sample.split_at_mut(split);
        return Node::Split {
            feature,
            threshold,
            left: Box::new(grow(left, depth + 1, max_depth, rng)),
            right: Box::new(grow(right, depth + 1, max_depth, rng)),
        };
    }

    // Every feature is constant within this node.
    Node::Leaf { size: sample.len() }
}

/// In-place partition; returns the number of rows satisfying `pred`, which end up first.
fn partition<T, F: Fn(&T) -> bool>(items: &mut [T], pred: F) -> usize {
    let mut next = 0;
    for i in 0..items.len() {
        if pred(&items[i]) {
            items.swap(i, next);
            next += 1;
        }
    }
    next
}

fn path_length<const N: usize>(node: &Node, row: &[f64; N], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            let next = if row[*feature] <= *threshold { left } else { right };
            path_length(next, row, depth + 1)
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Percentile with linear interpolation between closest ranks.
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}
