use tracing::{debug, info};

use crate::data::loader::DataLoader;
use crate::error::{Error, Result};
use crate::eval::{accumulator::ConfusionCounts, aggregator::predict, metrics::{finalize, AggregateMetrics}};
use crate::layers::Mode;
use crate::model::Model;

/// Runs one evaluation pass of an ensemble over `loader` and returns its metrics.
///
/// Every model is switched to eval mode and left there. Predictions are the
/// argmax of the averaged scores. With `verbose` the accuracy summary and the
/// per-class figures are logged at `info`, otherwise at `debug`.
pub fn evaluate(models: &mut [Box<dyn Model>], loader: &mut DataLoader<'_>, verbose: bool) -> Result<AggregateMetrics> {
    let num_classes = models.first().map(|m| m.num_classes()).ok_or(Error::EmptyEnsemble)?;
    for model in models.iter_mut() {
        model.set_mode(Mode::Eval);
    }

    let mut counts = ConfusionCounts::new();
    let mut y_true = Vec::with_capacity(loader.dataset_len());
    let mut y_pred = Vec::with_capacity(loader.dataset_len());

    for batch in loader.batches() {
        let scores = predict(models, &batch.images)?;
        let predicted = scores.argmax_rows();
        counts.update(&batch.labels, &predicted)?;
        y_true.extend_from_slice(&batch.labels);
        y_pred.extend(predicted);
    }

    let metrics = finalize(&counts, &y_true, &y_pred, num_classes, loader.dataset_len())?;

    let summary = format!(
        "Test set: Accuracy: {}/{} ({:.2}%), macro F1: {:.4}, weighted F1: {:.4}",
        counts.correct_total(),
        loader.dataset_len(),
        metrics.overall_accuracy,
        metrics.macro_f1,
        metrics.weighted_f1
    );
    if verbose {
        info!("{summary}");
    } else {
        debug!("{summary}");
    }
    for class in 0..num_classes {
        let m = metrics.per_class(class);
        let correct = counts.correct_for(class);
        let total = counts.total_for(class);
        if verbose {
            info!(class, correct, total, precision = m.precision, recall = m.recall, f1 = m.f1, "per-class result");
        } else {
            debug!(class, correct, total, precision = m.precision, recall = m.recall, f1 = m.f1, "per-class result");
        }
    }

    Ok(metrics)
}
