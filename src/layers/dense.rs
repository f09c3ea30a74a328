use crate::{
    activation::activation::ActivationFunction,
    error::{Error, Result},
    layers::{missing_cache, Layer, Mode, NamedParam, Param},
    math::{matrix::Matrix, tensor::Tensor},
};

/// Fully connected layer followed by an element-wise activation.
///
/// Weights are stored `input_size × size` so a batch row vector multiplies
/// from the left: `z = x·W + b`.
#[derive(Debug)]
pub struct Dense {
    pub size: usize,
    pub input_size: usize,
    pub weights: Param,
    pub biases: Param,
    pub activator: ActivationFunction,
    inputs: Option<Matrix>,
    pre_neurons: Option<Matrix>, // z = xW + b, needed for σ'(z)
}

impl Dense {
    pub fn new(size: usize, input_size: usize, activation: ActivationFunction) -> Dense {
        let weights = match activation {
            ActivationFunction::Identity => Matrix::xavier(input_size, size, input_size),
            _ => Matrix::he(input_size, size, input_size),
        };

        Dense {
            size,
            input_size,
            weights: Param::new(weights.to_flat()),
            biases: Param::new(vec![0.0; size]),
            activator: activation,
            inputs: None,
            pre_neurons: None,
        }
    }

    fn weight_matrix(&self) -> Matrix {
        Matrix::from_flat(self.input_size, self.size, &self.weights.value)
    }
}

impl Layer for Dense {
    fn forward(&mut self, input: &Tensor, mode: Mode) -> Result<Tensor> {
        let x = input.to_matrix();
        if x.cols != self.input_size {
            return Err(Error::Shape(format!(
                "dense layer expects {} input features, got {}",
                self.input_size, x.cols
            )));
        }

        let z = (x.clone() * self.weight_matrix()).add_row(&self.biases.value);
        let a = z.map(|v| self.activator.function(v));

        if mode == Mode::Train {
            self.inputs = Some(x);
            self.pre_neurons = Some(z);
        } else {
            self.inputs = None;
            self.pre_neurons = None;
        }
        Ok(Tensor::from_matrix(&a))
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let (inputs, z) = match (&self.inputs, &self.pre_neurons) {
            (Some(x), Some(z)) => (x, z),
            _ => return Err(missing_cache("dense")),
        };

        // δ = ∂L/∂a ⊙ σ'(z)
        let act_derivative = z.map(|v| self.activator.derivative(v));
        let delta = grad_output.to_matrix().hadamard(&act_derivative);

        let weights_grad = inputs.transpose() * delta.clone();
        let biases_grad = delta.column_sums();
        let grad_input = delta * self.weight_matrix().transpose();

        self.weights.accumulate(&weights_grad.to_flat());
        self.biases.accumulate(&biases_grad);

        Ok(Tensor::from_matrix(&grad_input))
    }

    fn collect_params<'a>(&'a mut self, prefix: &str, out: &mut Vec<NamedParam<'a>>) {
        out.push(NamedParam { name: format!("{prefix}weight"), param: &mut self.weights });
        out.push(NamedParam { name: format!("{prefix}bias"), param: &mut self.biases });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_layer() -> Dense {
        let mut layer = Dense::new(2, 3, ActivationFunction::Identity);
        layer.weights.value = vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        layer.biases.value = vec![0.5, -0.5];
        layer
    }

    #[test]
    fn test_forward_applies_affine_map() {
        let mut layer = fixed_layer();
        let x = Tensor::from_vec([1, 3, 1, 1], vec![1.0, 2.0, 3.0]).unwrap();
        let y = layer.forward(&x, Mode::Eval).unwrap();
        assert_eq!(y.data(), &[4.5, 4.5]);
    }

    #[test]
    fn test_backward_gradients() {
        let mut layer = fixed_layer();
        let x = Tensor::from_vec([1, 3, 1, 1], vec![1.0, 2.0, 3.0]).unwrap();
        layer.forward(&x, Mode::Train).unwrap();
        let g = Tensor::from_vec([1, 2, 1, 1], vec![1.0, 2.0]).unwrap();
        let gx = layer.backward(&g).unwrap();

        assert_eq!(layer.biases.grad, vec![1.0, 2.0]);
        assert_eq!(layer.weights.grad, vec![1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
        assert_eq!(gx.data(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_backward_requires_training_forward() {
        let mut layer = fixed_layer();
        let x = Tensor::from_vec([1, 3, 1, 1], vec![1.0, 2.0, 3.0]).unwrap();
        layer.forward(&x, Mode::Eval).unwrap();
        let g = Tensor::from_vec([1, 2, 1, 1], vec![1.0, 2.0]).unwrap();
        assert!(matches!(layer.backward(&g), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_rejects_wrong_width() {
        let mut layer = fixed_layer();
        let x = Tensor::from_vec([1, 2, 1, 1], vec![1.0, 2.0]).unwrap();
        assert!(matches!(layer.forward(&x, Mode::Eval), Err(Error::Shape(_))));
    }
}
