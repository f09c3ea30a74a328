use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{Model, ModelState};

/// Outcome of one [`EarlyStopper::observe`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStatus {
    Active,
    Stopped,
}

/// Stops training once the validation loss has failed to improve by more
/// than `delta` for `patience` consecutive epochs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarlyStopper {
    pub patience: usize,
    pub delta: f64,
}

impl Default for EarlyStopper {
    fn default() -> Self {
        EarlyStopper { patience: 5, delta: 0.0 }
    }
}

/// Progress of one training run, owned by the driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EarlyStoppingState {
    /// Negated best validation loss, `None` before the first observation.
    pub best_score: Option<f64>,
    /// Epochs since the last improvement.
    pub counter: usize,
    /// Set once and never cleared.
    pub early_stop: bool,
    /// Epoch of the retained snapshot at the moment training was stopped.
    pub epoch_stop: Option<usize>,
    /// Epoch at which `best_state` was taken.
    pub best_epoch: Option<usize>,
    /// Deep copy of the best parameters seen so far.
    pub best_state: Option<ModelState>,
}

impl EarlyStopper {
    pub fn new(patience: usize, delta: f64) -> EarlyStopper {
        EarlyStopper { patience, delta }
    }

    /// Records the validation loss of `epoch`, snapshotting `model` when it
    /// is the best so far.
    ///
    /// A stopped state stays stopped, though counters and the snapshot keep
    /// following the same rules if the caller keeps observing.
    pub fn observe(
        &self,
        state: &mut EarlyStoppingState,
        val_loss: f64,
        model: &mut dyn Model,
        epoch: usize,
    ) -> StopStatus {
        if val_loss.is_nan() {
            warn!(epoch, "validation loss is NaN");
        }
        let score = -val_loss;

        match state.best_score {
            // A NaN first loss is recorded but any real loss replaces it.
            None => self.record_best(state, score, model, epoch),
            Some(best) if best.is_nan() => self.record_best(state, score, model, epoch),
            // NaN never counts as an improvement.
            Some(best) if !(score >= best + self.delta) => {
                state.counter += 1;
                debug!(epoch, counter = state.counter, patience = self.patience, "no improvement");
                if state.counter >= self.patience {
                    state.early_stop = true;
                    state.epoch_stop = Some(epoch.saturating_sub(self.patience));
                    info!(epoch, best_epoch = ?state.epoch_stop, "early stopping triggered");
                }
            }
            Some(_) => self.record_best(state, score, model, epoch),
        }

        if state.early_stop {
            StopStatus::Stopped
        } else {
            StopStatus::Active
        }
    }

    fn record_best(&self, state: &mut EarlyStoppingState, score: f64, model: &mut dyn Model, epoch: usize) {
        debug!(epoch, val_loss = -score, "new best model");
        state.best_score = Some(score);
        state.best_state = Some(model.state_dict());
        state.best_epoch = Some(epoch);
        state.counter = 0;
    }
}

impl EarlyStoppingState {
    pub fn is_stopped(&self) -> bool {
        self.early_stop
    }

    /// Overwrites the parameters of `model` with the retained best snapshot.
    pub fn load_best(&self, model: &mut dyn Model) -> Result<()> {
        let best = self
            .best_state
            .as_ref()
            .ok_or_else(|| Error::InvalidState("load_best called before any observation".into()))?;
        model.load_state_dict(best)
    }
}
