use serde::{Serialize, Deserialize};

use crate::loss::{cross_entropy::{CrossEntropyLoss, NllLoss}, LossFunction};

/// Selects which loss function the training loop uses.
///
/// - `CrossEntropy` — softmax cross-entropy over raw logits; pair with ResNet-18.
/// - `Nll`          — negative log-likelihood over log-probabilities; pair
///   with the small CNN, whose last layer is a log-softmax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    #[default]
    CrossEntropy,
    Nll,
}

impl LossType {
    pub fn build(self) -> Box<dyn LossFunction> {
        match self {
            LossType::CrossEntropy => Box::new(CrossEntropyLoss),
            LossType::Nll => Box::new(NllLoss),
        }
    }
}
