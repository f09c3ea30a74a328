use crate::{
    error::Result,
    layers::{missing_cache, Layer, Mode},
    math::tensor::Tensor,
};

/// `[n, c, h, w]` → `[n, c·h·w, 1, 1]`.
#[derive(Debug, Default)]
pub struct Flatten {
    input_shape: Option<[usize; 4]>,
}

impl Flatten {
    pub fn new() -> Flatten {
        Flatten::default()
    }
}

impl Layer for Flatten {
    fn forward(&mut self, input: &Tensor, mode: Mode) -> Result<Tensor> {
        let [n, c, h, w] = input.shape();
        self.input_shape = (mode == Mode::Train).then_some(input.shape());
        input.clone().reshape([n, c * h * w, 1, 1])
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let shape = self.input_shape.ok_or_else(|| missing_cache("flatten"))?;
        grad_output.clone().reshape(shape)
    }
}
