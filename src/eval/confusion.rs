use std::fmt;

use crate::error::{Error, Result};

const CORNER: &str = "true\\pred";

/// `counts[t][p]` is the number of samples of true class `t` predicted as `p`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    counts: Vec<Vec<usize>>,
    labels: Vec<String>,
}

impl ConfusionMatrix {
    pub fn from_labels(y_true: &[usize], y_pred: &[usize], num_classes: usize) -> Result<ConfusionMatrix> {
        if y_true.len() != y_pred.len() {
            return Err(Error::LengthMismatch {
                what: "true and predicted labels",
                expected: y_true.len(),
                actual: y_pred.len(),
            });
        }
        let mut counts = vec![vec![0; num_classes]; num_classes];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            if let Some(&label) = [t, p].iter().find(|&&l| l >= num_classes) {
                return Err(Error::InvalidLabel { label, num_classes });
            }
            counts[t][p] += 1;
        }
        let labels = (0..num_classes).map(|c| c.to_string()).collect();
        Ok(ConfusionMatrix { counts, labels })
    }

    /// Replaces the numeric row/column headers with class names.
    pub fn with_class_names(mut self, names: &[String]) -> Self {
        if names.len() == self.labels.len() {
            self.labels = names.to_vec();
        }
        self
    }

    pub fn num_classes(&self) -> usize {
        self.counts.len()
    }

    pub fn get(&self, true_class: usize, predicted: usize) -> usize {
        self.counts[true_class][predicted]
    }

    pub fn counts(&self) -> &[Vec<usize>] {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Row `t` divided by its sum; rows without samples stay zero.
    pub fn normalized(&self) -> Vec<Vec<f64>> {
        self.counts
            .iter()
            .map(|row| {
                let sum: usize = row.iter().sum();
                row.iter()
                    .map(|&c| if sum == 0 { 0.0 } else { c as f64 / sum as f64 })
                    .collect()
            })
            .collect()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .labels
            .iter()
            .map(String::len)
            .chain(self.counts.iter().flatten().map(|c| c.to_string().len()))
            .max()
            .unwrap_or(0)
            .max(CORNER.len());

        write!(f, "{CORNER:>width$}")?;
        for label in &self.labels {
            write!(f, " {label:>width$}")?;
        }
        writeln!(f)?;
        for (label, row) in self.labels.iter().zip(self.counts.iter()) {
            write!(f, "{label:>width$}")?;
            for count in row {
                write!(f, " {count:>width$}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
