//! Precision, recall and F1 derived from accumulated confusion counts.
//!
//! Every rate degrades to `0.0` when its denominator is zero, so the results
//! are always finite.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::eval::accumulator::ConfusionCounts;

/// Precision, recall and F1 of a single class, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl PerClassMetrics {
    /// Rates for one class from its true-positive, false-positive and
    /// false-negative counts.
    pub fn from_counts(tp: usize, fp: usize, fn_: usize) -> PerClassMetrics {
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        PerClassMetrics { precision, recall, f1 }
    }
}

/// Result of one evaluation pass. The serialized field names are relied on
/// by reporting tools and must stay stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub per_class_precision: BTreeMap<usize, f64>,
    pub per_class_recall: BTreeMap<usize, f64>,
    pub per_class_f1: BTreeMap<usize, f64>,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub weighted_f1: f64,
    /// Percentage in `[0, 100]`.
    pub overall_accuracy: f64,
    /// Ground-truth label of every evaluated sample, in evaluation order.
    pub correct_labels: Vec<usize>,
    /// Predicted label of every evaluated sample, in evaluation order.
    pub predicted_labels: Vec<usize>,
}

impl AggregateMetrics {
    pub fn num_classes(&self) -> usize {
        self.per_class_f1.len()
    }

    pub fn per_class(&self, class: usize) -> PerClassMetrics {
        PerClassMetrics {
            precision: self.per_class_precision.get(&class).copied().unwrap_or(0.0),
            recall: self.per_class_recall.get(&class).copied().unwrap_or(0.0),
            f1: self.per_class_f1.get(&class).copied().unwrap_or(0.0),
        }
    }

    /// Number of ground-truth samples per class.
    pub fn support(&self) -> Vec<usize> {
        let mut support = vec![0; self.num_classes()];
        for &label in &self.correct_labels {
            if let Some(s) = support.get_mut(label) {
                *s += 1;
            }
        }
        support
    }
}

/// Turns the counts of a finished pass into per-class and aggregate metrics.
///
/// - Per-class rates and `macro_f1` cover every class in `0..num_classes`.
///   `macro_f1` always divides by `num_classes`, so classes that never
///   occurred pull it down with an F1 of 0.
/// - `macro_precision` and `macro_recall` come from [`macro_precision`] and
///   [`macro_recall`] over the label sequences, which average only over the
///   classes that actually occur. With absent classes the three macro
///   figures therefore use different denominators; this is intentional.
/// - `weighted_f1` weights each class F1 by its support.
/// - `overall_accuracy` divides by `dataset_len`, the declared size of the
///   evaluated dataset, rather than by the number of samples counted.
pub fn finalize(
    counts: &ConfusionCounts,
    y_true_all: &[usize],
    y_pred_all: &[usize],
    num_classes: usize,
    dataset_len: usize,
) -> Result<AggregateMetrics> {
    if y_true_all.len() != y_pred_all.len() {
        return Err(Error::LengthMismatch {
            what: "true and predicted label sequences",
            expected: y_true_all.len(),
            actual: y_pred_all.len(),
        });
    }

    let mut per_class_precision = BTreeMap::new();
    let mut per_class_recall = BTreeMap::new();
    let mut per_class_f1 = BTreeMap::new();
    let mut macro_f1_sum = 0.0;
    let mut weighted_f1_sum = 0.0;

    for class in 0..num_classes {
        let tp = counts.correct_for(class);
        let fn_ = counts.wrong_for(class).len();
        let fp = counts.predicted_as(class).saturating_sub(tp);
        let support = counts.total_for(class);

        let m = PerClassMetrics::from_counts(tp, fp, fn_);
        per_class_precision.insert(class, m.precision);
        per_class_recall.insert(class, m.recall);
        per_class_f1.insert(class, m.f1);

        macro_f1_sum += m.f1;
        weighted_f1_sum += m.f1 * support as f64;
    }

    let total_samples = counts.total_samples();
    if dataset_len < total_samples {
        warn!(dataset_len, total_samples, "more samples were counted than the dataset declares");
    }

    Ok(AggregateMetrics {
        per_class_precision,
        per_class_recall,
        per_class_f1,
        macro_precision: macro_precision(y_true_all, y_pred_all),
        macro_recall: macro_recall(y_true_all, y_pred_all),
        macro_f1: if num_classes > 0 { macro_f1_sum / num_classes as f64 } else { 0.0 },
        weighted_f1: if total_samples > 0 { weighted_f1_sum / total_samples as f64 } else { 0.0 },
        overall_accuracy: ratio(counts.correct_total(), dataset_len) * 100.0,
        correct_labels: y_true_all.to_vec(),
        predicted_labels: y_pred_all.to_vec(),
    })
}

/// Unweighted mean of per-class precision over every label present in
/// either sequence. A class that was never predicted has precision 0.
pub fn macro_precision(y_true: &[usize], y_pred: &[usize]) -> f64 {
    macro_average(y_true, y_pred, |tp, fp, _| ratio(tp, tp + fp))
}

/// Unweighted mean of per-class recall over every label present in either
/// sequence. A class that never occurred in `y_true` has recall 0.
pub fn macro_recall(y_true: &[usize], y_pred: &[usize]) -> f64 {
    macro_average(y_true, y_pred, |tp, _, fn_| ratio(tp, tp + fn_))
}

fn macro_average(y_true: &[usize], y_pred: &[usize], rate: impl Fn(usize, usize, usize) -> f64) -> f64 {
    let mut labels: Vec<usize> = y_true.iter().chain(y_pred.iter()).copied().collect();
    labels.sort_unstable();
    labels.dedup();
    if labels.is_empty() {
        return 0.0;
    }

    let sum: f64 = labels
        .iter()
        .map(|&class| {
            let mut tp = 0;
            let mut fp = 0;
            let mut fn_ = 0;
            for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
                match (t == class, p == class) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_ += 1,
                    (false, false) => {}
                }
            }
            rate(tp, fp, fn_)
        })
        .sum();
    sum / labels.len() as f64
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
