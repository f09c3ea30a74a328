use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Streaming per-class tallies for one evaluation pass.
///
/// Labels never seen read as zero; reads never insert keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfusionCounts {
    correct_total: usize,
    total_per_class: BTreeMap<usize, usize>,
    correct_per_class: BTreeMap<usize, usize>,
    predicted_as_class: BTreeMap<usize, usize>,
    /// True class -> predicted classes of its misclassifications, in arrival order.
    wrong_predictions: BTreeMap<usize, Vec<usize>>,
}

impl ConfusionCounts {
    pub fn new() -> ConfusionCounts {
        ConfusionCounts::default()
    }

    /// Folds one batch of `(true, predicted)` pairs into the counts.
    ///
    /// The two slices are paired by position and must have equal length;
    /// nothing is recorded when they don't.
    pub fn update(&mut self, true_labels: &[usize], predicted: &[usize]) -> Result<()> {
        if true_labels.len() != predicted.len() {
            return Err(Error::LengthMismatch {
                what: "true and predicted labels",
                expected: true_labels.len(),
                actual: predicted.len(),
            });
        }
        for (&t, &p) in true_labels.iter().zip(predicted.iter()) {
            *self.total_per_class.entry(t).or_insert(0) += 1;
            *self.predicted_as_class.entry(p).or_insert(0) += 1;
            if t == p {
                *self.correct_per_class.entry(t).or_insert(0) += 1;
                self.correct_total += 1;
            } else {
                self.wrong_predictions.entry(t).or_default().push(p);
            }
        }
        Ok(())
    }

    pub fn correct_total(&self) -> usize {
        self.correct_total
    }

    pub fn total_for(&self, class: usize) -> usize {
        self.total_per_class.get(&class).copied().unwrap_or(0)
    }

    pub fn correct_for(&self, class: usize) -> usize {
        self.correct_per_class.get(&class).copied().unwrap_or(0)
    }

    pub fn predicted_as(&self, class: usize) -> usize {
        self.predicted_as_class.get(&class).copied().unwrap_or(0)
    }

    pub fn wrong_for(&self, class: usize) -> &[usize] {
        self.wrong_predictions.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of samples recorded so far.
    pub fn total_samples(&self) -> usize {
        self.total_per_class.values().sum()
    }

    pub fn total_wrong(&self) -> usize {
        self.wrong_predictions.values().map(Vec::len).sum()
    }

    /// Every sample is counted once as either correct or wrong.
    pub fn is_consistent(&self) -> bool {
        self.total_samples() == self.correct_total + self.total_wrong()
    }

    /// Classes that occurred as a true or a predicted label.
    pub fn seen_classes(&self) -> Vec<usize> {
        let mut classes: Vec<usize> = self
            .total_per_class
            .keys()
            .chain(self.predicted_as_class.keys())
            .copied()
            .collect();
        classes.sort_unstable();
        classes.dedup();
        classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_counts_pairs() {
        let mut counts = ConfusionCounts::new();
        counts.update(&[0, 0, 1], &[0, 1, 1]).unwrap();
        counts.update(&[2, 2, 2], &[2, 0, 2]).unwrap();

        assert_eq!(counts.correct_total(), 4);
        assert_eq!(counts.total_for(2), 3);
        assert_eq!(counts.correct_for(0), 1);
        assert_eq!(counts.predicted_as(0), 2);
        assert_eq!(counts.wrong_for(0), &[1]);
        assert_eq!(counts.wrong_for(2), &[0]);
        assert!(counts.is_consistent());
    }

    #[test]
    fn test_absent_classes_read_zero() {
        let counts = ConfusionCounts::new();
        assert_eq!(counts.total_for(6), 0);
        assert_eq!(counts.predicted_as(6), 0);
        assert!(counts.wrong_for(6).is_empty());
        assert_eq!(counts, ConfusionCounts::new());
    }

    #[test]
    fn test_wrong_predictions_keep_arrival_order() {
        let mut counts = ConfusionCounts::new();
        counts.update(&[1, 1], &[3, 0]).unwrap();
        counts.update(&[1], &[2]).unwrap();
        assert_eq!(counts.wrong_for(1), &[3, 0, 2]);
    }

    #[test]
    fn test_length_mismatch_records_nothing() {
        let mut counts = ConfusionCounts::new();
        let err = counts.update(&[0, 1], &[0]).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { expected: 2, actual: 1, .. }));
        assert_eq!(counts.total_samples(), 0);
    }

    #[test]
    fn test_seen_classes_union() {
        let mut counts = ConfusionCounts::new();
        counts.update(&[4, 1], &[4, 5]).unwrap();
        assert_eq!(counts.seen_classes(), vec![1, 4, 5]);
    }
}
