use serde::{Deserialize, Serialize};

/// How much progress the training loop reports.
///
/// - `Silent`  — nothing beyond warnings
/// - `Batches` — a progress line every `log_interval` batches
/// - `Epochs`  — batch progress plus a summary after every pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Silent,
    Batches,
    #[default]
    Epochs,
}

/// Configuration for a `fit` run.
///
/// # Fields
/// - `epochs`         — maximum number of passes over the training data
/// - `batch_size`     — samples per mini-batch
/// - `record_history` — when `false` the per-pass loss and accuracy are not
///                      collected and every pass reports zeros
/// - `verbosity`      — progress reporting level
/// - `log_interval`   — batches between two progress lines
/// - `patience`       — early-stopping patience in epochs
/// - `delta`          — minimum validation-loss improvement that counts
/// - `shuffle`        — reshuffle the training set every epoch
/// - `seed`           — seeds shuffling and the train/validation split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub record_history: bool,
    pub verbosity: Verbosity,
    pub log_interval: usize,
    pub patience: usize,
    pub delta: f64,
    pub shuffle: bool,
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            epochs: 50,
            batch_size: 64,
            record_history: true,
            verbosity: Verbosity::Epochs,
            log_interval: 10,
            patience: 5,
            delta: 0.0,
            shuffle: true,
            seed: None,
        }
    }
}

impl TrainConfig {
    /// Creates a config with the given epoch count and batch size and defaults elsewhere.
    pub fn new(epochs: usize, batch_size: usize) -> Self {
        TrainConfig { epochs, batch_size, ..TrainConfig::default() }
    }
}
