use std::time::Instant;

use tracing::{info, warn};

use crate::data::loader::DataLoader;
use crate::error::Result;
use crate::loss::LossFunction;
use crate::model::Model;
use crate::optim::Optimizer;
use crate::train::early_stopping::{EarlyStopper, EarlyStoppingState, StopStatus};
use crate::train::epoch_stats::{EpochStats, TrainingHistory};
use crate::train::loop_fn::{train_epoch, validate};
use crate::train::train_config::TrainConfig;

/// Trains `model` for up to `config.epochs` epochs with early stopping on
/// the validation loss, then restores the best parameters seen.
///
/// Validation is always measured, since early stopping depends on it;
/// `record_history` only affects the training figures.
pub fn fit(
    model: &mut dyn Model,
    train_loader: &mut DataLoader<'_>,
    val_loader: &mut DataLoader<'_>,
    loss_fn: &dyn LossFunction,
    optimizer: &mut dyn Optimizer,
    config: &TrainConfig,
) -> Result<TrainingHistory> {
    let stopper = EarlyStopper::new(config.patience, config.delta);
    let mut state = EarlyStoppingState::default();
    let mut history = TrainingHistory::default();
    let val_config = TrainConfig { record_history: true, ..config.clone() };

    if config.epochs == 0 {
        warn!("fit called with zero epochs, nothing to do");
        return Ok(history);
    }

    for epoch in 0..config.epochs {
        let t_start = Instant::now();

        let train = train_epoch(model, train_loader, loss_fn, optimizer, epoch, config)?;
        let val = validate(model, val_loader, loss_fn, &val_config)?;

        history.epochs.push(EpochStats {
            epoch,
            total_epochs: config.epochs,
            train_loss: train.avg_loss,
            train_accuracy: train.accuracy,
            val_loss: val.avg_loss,
            val_accuracy: val.accuracy,
            elapsed_ms: t_start.elapsed().as_millis() as u64,
        });

        if stopper.observe(&mut state, val.avg_loss, model, epoch) == StopStatus::Stopped {
            info!(epoch, "stopping early");
            break;
        }
    }

    state.load_best(model)?;
    history.stopped_early = state.is_stopped();
    history.best_epoch = state.best_epoch;
    info!(best_epoch = ?state.best_epoch, epochs_run = history.epochs.len(), "training finished");
    Ok(history)
}
