//! Building blocks for the convolutional classifiers.
//!
//! Every layer maps a `Tensor` to a `Tensor`. In `Mode::Train` a layer keeps
//! whatever it needs from the forward pass to run `backward` later; in
//! `Mode::Eval` nothing is cached and `backward` is an error.

pub mod activation;
pub mod batch_norm;
pub mod conv;
pub mod dense;
pub mod param;
pub mod pool;
pub mod reshape;
pub mod sequential;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math::tensor::Tensor;

pub use activation::{Activation, LogSoftmax};
pub use batch_norm::BatchNorm2d;
pub use conv::Conv2d;
pub use dense::Dense;
pub use param::{NamedParam, Param};
pub use pool::{GlobalAvgPool, MaxPool2d};
pub use reshape::Flatten;
pub use sequential::Sequential;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Train,
    Eval,
}

pub trait Layer {
    fn forward(&mut self, input: &Tensor, mode: Mode) -> Result<Tensor>;

    /// Propagates `grad_output` (∂L/∂output) back through the layer,
    /// accumulating parameter gradients, and returns ∂L/∂input.
    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor>;

    /// Appends this layer's parameters, named `prefix` + local name.
    fn collect_params<'a>(&'a mut self, _prefix: &str, _out: &mut Vec<NamedParam<'a>>) {}
}

pub(crate) fn missing_cache(layer: &str) -> crate::error::Error {
    crate::error::Error::InvalidState(format!(
        "{layer}: backward called without a preceding training-mode forward pass"
    ))
}
