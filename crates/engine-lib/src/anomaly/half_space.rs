//! Streaming half-space trees
//!
//! Each model is an ensemble of randomized binary trees built once over a
//! fixed working range of the (log-compressed) metric value. Every node keeps
//! two mass counters: the reference window used for scoring and the current
//! window being filled by learning. Every `window_size` learned samples the
//! current window becomes the reference window for all nodes at once.
//!
//! A sample that lands in nodes with little reference mass close to the root
//! is isolated from recent history and scores close to 1.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use crate::error::{check_range, ConfigError};
use serde::{Deserialize, Serialize};

/// Half-width of the working range in log-compressed space.
///
/// `ln(1 + 1.07e13)` is 30: larger magnitudes all land on the edge and cannot
/// be told apart. Values below 1 share the `[0, ln 2)` band, so sub-unit
/// ratios resolve coarsely.
const WORK_RANGE: f64 = 30.0;

/// Fraction of a node range excluded from split sampling at each end
const SPLIT_PADDING: f64 = 0.3;

/// Nodes holding less than this fraction of a window stop the scoring walk
const SIZE_LIMIT_FRACTION: f64 = 0.1;

/// Hyperparameters for a per-metric model
///
/// Supported ranges: `n_trees` 1..=100, `height` 4..=16, `window_size`
/// 50..=1000. Node arrays grow as `2^(height+1)`, so heights far outside the
/// range overflow or exhaust memory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Number of trees in the ensemble
    pub n_trees: usize,
    /// Depth of every tree (root is depth 0)
    pub height: usize,
    /// Learned samples per window rotation
    pub window_size: u64,
    /// Seed for split point generation
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_trees: 10,
            height: 8,
            window_size: 200,
            seed: 42,
        }
    }
}

impl ModelConfig {
    /// Check every hyperparameter against its supported range
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("n_trees", self.n_trees as f64, 1.0, 100.0)?;
        check_range("height", self.height as f64, 4.0, 16.0)?;
        check_range("window_size", self.window_size as f64, 50.0, 1000.0)
    }

    /// Mass accumulated by a point that shares every node with a full window
    fn max_mass(&self) -> f64 {
        let nodes_weight = (1u64 << (self.height + 1)) - 1;
        self.n_trees as f64 * self.window_size as f64 * nodes_weight as f64
    }
}

/// A single randomized tree stored in heap order
#[derive(Debug, Clone)]
struct HalfSpaceTree {
    /// Split thresholds of internal nodes; children of `i` are `2i+1`, `2i+2`
    splits: Vec<f64>,
    reference: Vec<u64>,
    current: Vec<u64>,
}

impl HalfSpaceTree {
    fn build(height: usize, rng: &mut ChaCha20Rng) -> Self {
        let internal = (1usize << height) - 1;
        let total = (1usize << (height + 1)) - 1;

        let mut splits = vec![0.0; internal];
        fill_splits(&mut splits, 0, -WORK_RANGE, WORK_RANGE, rng);

        Self {
            splits,
            reference: vec![0; total],
            current: vec![0; total],
        }
    }

    fn walk(&self, x: f64) -> Walk<'_> {
        Walk::new(&self.splits, x)
    }

    fn record(&mut self, x: f64) {
        let Self {
            splits, current, ..
        } = self;
        for (_, idx) in Walk::new(splits, x) {
            current[idx] += 1;
        }
    }

    fn rotate(&mut self) {
        std::mem::swap(&mut self.reference, &mut self.current);
        self.current.fill(0);
    }
}

/// Preorder split generation so draws from the generator are reproducible
fn fill_splits(splits: &mut [f64], idx: usize, lo: f64, hi: f64, rng: &mut ChaCha20Rng) {
    if idx >= splits.len() {
        return;
    }

    let pad = SPLIT_PADDING * (hi - lo);
    let at = rng.gen_range((lo + pad)..(hi - pad));
    splits[idx] = at;

    fill_splits(splits, 2 * idx + 1, lo, at, rng);
    fill_splits(splits, 2 * idx + 2, at, hi, rng);
}

/// Root-to-leaf traversal yielding `(depth, node_index)`
struct Walk<'a> {
    splits: &'a [f64],
    x: f64,
    next: Option<usize>,
    depth: u32,
}

impl<'a> Walk<'a> {
    fn new(splits: &'a [f64], x: f64) -> Self {
        Self {
            splits,
            x,
            next: Some(0),
            depth: 0,
        }
    }
}

impl Iterator for Walk<'_> {
    type Item = (u32, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.next?;
        let depth = self.depth;

        self.next = self.splits.get(idx).map(|&at| {
            if self.x < at {
                2 * idx + 1
            } else {
                2 * idx + 2
            }
        });
        self.depth += 1;

        Some((depth, idx))
    }
}

/// Map a raw metric value into the working range
fn project(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    let compressed = value.signum() * value.abs().ln_1p();
    compressed.clamp(-WORK_RANGE, WORK_RANGE)
}

/// Half-space-tree ensemble for one metric
#[derive(Debug, Clone)]
pub struct HalfSpaceTrees {
    config: ModelConfig,
    trees: Vec<HalfSpaceTree>,
    size_limit: f64,
    /// Samples learned since the last rotation
    window_fill: u64,
    rotations: u64,
    samples_learned: u64,
}

impl HalfSpaceTrees {
    /// Build the ensemble; split points are drawn once from `config.seed`
    ///
    /// `config` must pass [`ModelConfig::validate`]; debug builds assert it.
    pub fn new(config: ModelConfig) -> Self {
        debug_assert!(
            config.validate().is_ok(),
            "model config out of range: {:?}",
            config
        );
        let mut rng = ChaCha20Rng::seed_from_u64(config.seed);
        let trees = (0..config.n_trees)
            .map(|_| HalfSpaceTree::build(config.height, &mut rng))
            .collect();

        Self {
            config,
            trees,
            size_limit: SIZE_LIMIT_FRACTION * config.window_size as f64,
            window_fill: 0,
            rotations: 0,
            samples_learned: 0,
        }
    }

    /// Anomaly score in `[0, 1]` against the reference window
    ///
    /// Returns 0 until the first window rotation has produced a reference.
    pub fn score_one(&self, value: f64) -> f64 {
        if self.rotations == 0 {
            return 0.0;
        }

        let max_mass = self.config.max_mass();
        if max_mass <= 0.0 {
            return 0.0;
        }

        let x = project(value);
        let mut mass = 0.0;

        for tree in &self.trees {
            for (depth, idx) in tree.walk(x) {
                let node_mass = tree.reference[idx] as f64;
                mass += node_mass * f64::from(2u32.pow(depth));
                if node_mass < self.size_limit {
                    break;
                }
            }
        }

        let score = 1.0 - mass / max_mass;
        if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Add the value to the current window, rotating when the window is full
    pub fn learn_one(&mut self, value: f64) {
        let x = project(value);
        for tree in &mut self.trees {
            tree.record(x);
        }

        self.samples_learned += 1;
        self.window_fill += 1;
        if self.window_fill >= self.config.window_size {
            self.rotate();
        }
    }

    fn rotate(&mut self) {
        for tree in &mut self.trees {
            tree.rotate();
        }
        self.window_fill = 0;
        self.rotations += 1;
    }

    /// Number of completed window rotations
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    pub fn samples_learned(&self) -> u64 {
        self.samples_learned
    }
}
