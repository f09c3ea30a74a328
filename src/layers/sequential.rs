use crate::{
    error::Result,
    layers::{Layer, Mode, NamedParam},
    math::tensor::Tensor,
};

/// Ordered chain of named layers. Parameter names are prefixed with the
/// layer name, e.g. `conv1.weight`.
#[derive(Default)]
pub struct Sequential {
    pub layers: Vec<(String, Box<dyn Layer>)>,
}

impl Sequential {
    pub fn new() -> Sequential {
        Sequential { layers: Vec::new() }
    }

    pub fn push<L: Layer + 'static>(&mut self, name: impl Into<String>, layer: L) {
        self.layers.push((name.into(), Box::new(layer)));
    }

    /// Builder-style variant of `push`.
    pub fn with<L: Layer + 'static>(mut self, name: impl Into<String>, layer: L) -> Sequential {
        self.push(name, layer);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Layer for Sequential {
    fn forward(&mut self, input: &Tensor, mode: Mode) -> Result<Tensor> {
        let mut current = input.clone();
        for (_, layer) in &mut self.layers {
            current = layer.forward(&current, mode)?;
        }
        Ok(current)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let mut delta = grad_output.clone();
        for (_, layer) in self.layers.iter_mut().rev() {
            delta = layer.backward(&delta)?;
        }
        Ok(delta)
    }

    fn collect_params<'a>(&'a mut self, prefix: &str, out: &mut Vec<NamedParam<'a>>) {
        for (name, layer) in &mut self.layers {
            layer.collect_params(&format!("{prefix}{name}."), out);
        }
    }
}
