use crate::error::Result;
use crate::layers::activation::log_softmax_row;
use crate::loss::{check_batch, LossFunction, LossOutput};
use crate::math::matrix::Matrix;

/// Categorical cross-entropy over raw logits.
pub struct CrossEntropyLoss;

impl LossFunction for CrossEntropyLoss {
    /// Mean over the batch of `-log softmax(scores)[label]`.
    ///
    /// The gradient of the combined Softmax + cross-entropy with respect to
    /// the logits simplifies to `(softmax - onehot) / batch`.
    fn forward(&self, scores: &Matrix, labels: &[usize]) -> Result<LossOutput> {
        check_batch(scores, labels)?;
        let n = scores.rows.max(1) as f64;

        let mut loss = 0.0;
        let mut grad = Matrix::zeros(scores.rows, scores.cols);
        for ((row, &label), grad_row) in scores.data.iter().zip(labels.iter()).zip(grad.data.iter_mut()) {
            let log_probs = log_softmax_row(row);
            loss -= log_probs[label];
            for (g, lp) in grad_row.iter_mut().zip(log_probs.iter()) {
                *g = lp.exp() / n;
            }
            grad_row[label] -= 1.0 / n;
        }

        Ok(LossOutput { loss: loss / n, grad })
    }
}

/// Negative log-likelihood over log-probabilities (pairs with a
/// log-softmax output layer).
pub struct NllLoss;

impl LossFunction for NllLoss {
    fn forward(&self, scores: &Matrix, labels: &[usize]) -> Result<LossOutput> {
        check_batch(scores, labels)?;
        let n = scores.rows.max(1) as f64;

        let mut loss = 0.0;
        let mut grad = Matrix::zeros(scores.rows, scores.cols);
        for (i, &label) in labels.iter().enumerate() {
            loss -= scores.data[i][label];
            grad.data[i][label] = -1.0 / n;
        }

        Ok(LossOutput { loss: loss / n, grad })
    }
}
