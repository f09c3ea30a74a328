pub mod cross_entropy;
pub mod loss_type;

use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

pub use cross_entropy::{CrossEntropyLoss, NllLoss};
pub use loss_type::LossType;

/// Scalar batch loss together with ∂loss/∂scores.
#[derive(Debug, Clone)]
pub struct LossOutput {
    pub loss: f64,
    pub grad: Matrix,
}

pub trait LossFunction {
    /// `scores` is `[batch, num_classes]`; `labels` holds one class per row.
    fn forward(&self, scores: &Matrix, labels: &[usize]) -> Result<LossOutput>;
}

pub(crate) fn check_batch(scores: &Matrix, labels: &[usize]) -> Result<()> {
    if scores.rows != labels.len() {
        return Err(Error::LengthMismatch {
            what: "scores and labels",
            expected: scores.rows,
            actual: labels.len(),
        });
    }
    if let Some(&label) = labels.iter().find(|&&l| l >= scores.cols) {
        return Err(Error::InvalidLabel { label, num_classes: scores.cols });
    }
    Ok(())
}
