//! Classifier models and their persisted state.

pub mod checkpoint;
pub mod metadata;
pub mod resnet;
pub mod small_cnn;
pub mod spec;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layers::{Mode, NamedParam};
use crate::math::{matrix::Matrix, tensor::Tensor};

pub use checkpoint::Checkpoint;
pub use metadata::{InputShape, ModelMetadata};
pub use resnet::{ResNet18, ResNetConfig};
pub use small_cnn::{SmallCnn, SmallCnnConfig};
pub use spec::ModelSpec;

/// An image classifier: `images [batch, c, h, w] -> scores [batch, num_classes]`.
pub trait Model {
    fn num_classes(&self) -> usize;

    fn mode(&self) -> Mode;

    fn set_mode(&mut self, mode: Mode);

    fn forward(&mut self, images: &Tensor) -> Result<Matrix>;

    /// Back-propagates ∂L/∂scores from the most recent training-mode forward
    /// pass, accumulating gradients into every parameter.
    fn backward(&mut self, grad_scores: &Matrix) -> Result<()>;

    /// Every parameter and buffer in a stable order.
    fn parameters(&mut self) -> Vec<NamedParam<'_>>;

    /// Deep copy of every parameter and buffer.
    fn state_dict(&mut self) -> ModelState {
        let tensors = self
            .parameters()
            .into_iter()
            .map(|p| (p.name, p.param.value.clone()))
            .collect();
        ModelState { tensors }
    }

    /// Overwrites every parameter with the values in `state`. The layouts
    /// must match exactly; on error the model is left untouched.
    fn load_state_dict(&mut self, state: &ModelState) -> Result<()> {
        let mut params = self.parameters();
        if params.len() != state.tensors.len() {
            return Err(Error::StateMismatch(format!(
                "model has {} tensors, state has {}",
                params.len(),
                state.tensors.len()
            )));
        }
        for p in &params {
            match state.tensors.get(&p.name) {
                None => return Err(Error::StateMismatch(format!("missing tensor '{}'", p.name))),
                Some(values) if values.len() != p.param.len() => {
                    return Err(Error::StateMismatch(format!(
                        "tensor '{}' has {} values, expected {}",
                        p.name,
                        values.len(),
                        p.param.len()
                    )))
                }
                Some(_) => {}
            }
        }
        for p in params.iter_mut() {
            if let Some(values) = state.tensors.get(&p.name) {
                p.param.value.copy_from_slice(values);
            }
        }
        Ok(())
    }
}

/// Named snapshot of a model's parameters and buffers.
///
/// Owns its buffers, so later optimizer steps on the model never alter a
/// snapshot taken earlier.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelState {
    pub tensors: BTreeMap<String, Vec<f64>>,
}

impl ModelState {
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Total number of scalars across all tensors.
    pub fn num_values(&self) -> usize {
        self.tensors.values().map(Vec::len).sum()
    }
}

pub(crate) fn check_input(images: &Tensor, channels: usize) -> Result<()> {
    let [_, c, _, _] = images.shape();
    if c != channels {
        return Err(Error::Shape(format!(
            "model expects {channels}-channel images, got {c} channels"
        )));
    }
    Ok(())
}

pub(crate) fn scores_from(output: Tensor, num_classes: usize) -> Result<Matrix> {
    let [_, k, h, w] = output.shape();
    if k * h * w != num_classes {
        return Err(Error::Shape(format!(
            "model produced {} scores per sample, expected {num_classes}",
            k * h * w
        )));
    }
    Ok(output.to_matrix())
}
