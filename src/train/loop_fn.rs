use tracing::{debug, info};

use crate::data::loader::{Batch, DataLoader};
use crate::error::Result;
use crate::layers::Mode;
use crate::loss::LossFunction;
use crate::math::matrix::Matrix;
use crate::model::Model;
use crate::optim::Optimizer;
use crate::train::train_config::{TrainConfig, Verbosity};

/// Mean batch loss and accuracy (percent of the dataset size) of one pass.
/// Both are zero when history recording is off.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PassSummary {
    pub avg_loss: f64,
    pub accuracy: f64,
}

/// Running totals of a pass.
#[derive(Default)]
struct Tally {
    loss_sum: f64,
    batches: usize,
    correct: usize,
}

impl Tally {
    fn add(&mut self, loss: f64, scores: &Matrix, batch: &Batch) {
        self.loss_sum += loss;
        self.batches += 1;
        self.correct += count_correct(scores, &batch.labels);
    }

    fn avg_loss(&self) -> f64 {
        if self.batches == 0 {
            0.0
        } else {
            self.loss_sum / self.batches as f64
        }
    }

    fn accuracy(&self, dataset_len: usize) -> f64 {
        if dataset_len == 0 {
            0.0
        } else {
            100.0 * self.correct as f64 / dataset_len as f64
        }
    }

    fn summary(&self, dataset_len: usize, record: bool) -> PassSummary {
        if !record {
            return PassSummary::default();
        }
        PassSummary { avg_loss: self.avg_loss(), accuracy: self.accuracy(dataset_len) }
    }
}

/// Runs one optimisation pass over `loader`.
///
/// Every batch zeroes the gradients, runs forward and backward and applies
/// one optimizer step.
pub fn train_epoch(
    model: &mut dyn Model,
    loader: &mut DataLoader<'_>,
    loss_fn: &dyn LossFunction,
    optimizer: &mut dyn Optimizer,
    epoch: usize,
    config: &TrainConfig,
) -> Result<PassSummary> {
    model.set_mode(Mode::Train);
    let dataset_len = loader.dataset_len();
    let batch_size = loader.batch_size();
    let mut tally = Tally::default();

    for (batch_idx, batch) in loader.batches().enumerate() {
        optimizer.zero_grad(model);
        let scores = model.forward(&batch.images)?;
        let out = loss_fn.forward(&scores, &batch.labels)?;
        model.backward(&out.grad)?;
        optimizer.step(model)?;
        tally.add(out.loss, &scores, &batch);

        if config.verbosity >= Verbosity::Batches && config.log_interval > 0 && batch_idx % config.log_interval == 0 {
            let done = batch_idx * batch_size;
            info!(
                "Train Epoch {} [{}/{} ({:.0}%)]\tLoss: {:.6}",
                epoch,
                done,
                dataset_len,
                100.0 * done as f64 / dataset_len.max(1) as f64,
                out.loss
            );
        }
    }

    if config.verbosity >= Verbosity::Epochs {
        info!(
            "Train set: Average loss {:.4}, Accuracy: {}/{} ({:.0}%)",
            tally.avg_loss(),
            tally.correct,
            dataset_len,
            tally.accuracy(dataset_len)
        );
    }
    Ok(tally.summary(dataset_len, config.record_history))
}

/// Computes loss and accuracy over `loader` without touching the parameters.
pub fn validate(
    model: &mut dyn Model,
    loader: &mut DataLoader<'_>,
    loss_fn: &dyn LossFunction,
    config: &TrainConfig,
) -> Result<PassSummary> {
    model.set_mode(Mode::Eval);
    let dataset_len = loader.dataset_len();
    let mut tally = Tally::default();

    for batch in loader.batches() {
        let scores = model.forward(&batch.images)?;
        let out = loss_fn.forward(&scores, &batch.labels)?;
        tally.add(out.loss, &scores, &batch);
    }

    if config.verbosity > Verbosity::Silent {
        info!(
            "Validation set: Average loss: {:.4}, Accuracy: {}/{} ({:.0}%)",
            tally.avg_loss(),
            tally.correct,
            dataset_len,
            tally.accuracy(dataset_len)
        );
    } else {
        debug!(avg_loss = tally.avg_loss(), correct = tally.correct, dataset_len, "validation pass");
    }
    Ok(tally.summary(dataset_len, config.record_history))
}

fn count_correct(scores: &Matrix, labels: &[usize]) -> usize {
    scores
        .argmax_rows()
        .iter()
        .zip(labels.iter())
        .filter(|(p, t)| p == t)
        .count()
}
