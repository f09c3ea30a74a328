use serde::{Deserialize, Serialize};

/// Per-epoch training statistics collected by `fit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 0-based epoch number.
    pub epoch: usize,
    /// Maximum epochs requested for this run.
    pub total_epochs: usize,
    /// Mean batch loss over the training pass.
    pub train_loss: f64,
    /// Training accuracy as a percentage of the training set size.
    pub train_accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}

/// Everything `fit` learned about one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochStats>,
    pub stopped_early: bool,
    /// Epoch whose parameters were restored into the model.
    pub best_epoch: Option<usize>,
}

impl TrainingHistory {
    pub fn train_losses(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.train_loss).collect()
    }

    pub fn val_losses(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.val_loss).collect()
    }
}
