use crate::{
    activation::activation::ActivationFunction,
    error::{Error, Result},
    layers::{missing_cache, Layer, Mode},
    math::tensor::Tensor,
};

/// Standalone element-wise activation (the ReLU between convolutions).
#[derive(Debug)]
pub struct Activation {
    pub function: ActivationFunction,
    pre: Option<Tensor>,
}

impl Activation {
    pub fn new(function: ActivationFunction) -> Activation {
        Activation { function, pre: None }
    }

    pub fn relu() -> Activation {
        Activation::new(ActivationFunction::ReLU)
    }
}

impl Layer for Activation {
    fn forward(&mut self, input: &Tensor, mode: Mode) -> Result<Tensor> {
        let out = input.map(|x| self.function.function(x));
        self.pre = (mode == Mode::Train).then(|| input.clone());
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let pre = self.pre.as_ref().ok_or_else(|| missing_cache("activation"))?;
        if pre.shape() != grad_output.shape() {
            return Err(Error::Shape("activation gradient shape mismatch".into()));
        }
        let f = self.function;
        Ok(grad_output.zip_map(pre, |g, z| g * f.derivative(z)))
    }
}

/// Row-wise log-softmax over the feature axis of a `[batch, k, 1, 1]` tensor.
#[derive(Debug, Default)]
pub struct LogSoftmax {
    output: Option<Tensor>,
}

impl LogSoftmax {
    pub fn new() -> LogSoftmax {
        LogSoftmax::default()
    }
}

/// Numerically stable `log(softmax(row))`.
pub fn log_softmax_row(row: &[f64]) -> Vec<f64> {
    let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let log_sum = row.iter().map(|x| (x - max).exp()).sum::<f64>().ln() + max;
    row.iter().map(|x| x - log_sum).collect()
}

impl Layer for LogSoftmax {
    fn forward(&mut self, input: &Tensor, mode: Mode) -> Result<Tensor> {
        let m = input.to_matrix();
        let rows: Vec<f64> = m.data.iter().flat_map(|row| log_softmax_row(row)).collect();
        let out = Tensor::from_vec(input.shape(), rows)?;
        self.output = (mode == Mode::Train).then(|| out.clone());
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let out = self.output.as_ref().ok_or_else(|| missing_cache("log_softmax"))?;
        let y = out.to_matrix();
        let g = grad_output.to_matrix();
        if y.rows != g.rows || y.cols != g.cols {
            return Err(Error::Shape("log_softmax gradient shape mismatch".into()));
        }

        // ∂L/∂x_j = g_j - softmax_j · Σ g
        let mut data = Vec::with_capacity(y.rows * y.cols);
        for (y_row, g_row) in y.data.iter().zip(g.data.iter()) {
            let g_sum: f64 = g_row.iter().sum();
            data.extend(y_row.iter().zip(g_row.iter()).map(|(yj, gj)| gj - yj.exp() * g_sum));
        }
        Tensor::from_vec(grad_output.shape(), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_relu_backward_masks_negative_inputs() {
        let mut relu = Activation::relu();
        let x = Tensor::from_vec([1, 4, 1, 1], vec![-1.0, 2.0, 0.0, 3.0]).unwrap();
        let y = relu.forward(&x, Mode::Train).unwrap();
        assert_eq!(y.data(), &[0.0, 2.0, 0.0, 3.0]);
        let g = relu.backward(&Tensor::from_vec([1, 4, 1, 1], vec![1.0; 4]).unwrap()).unwrap();
        assert_eq!(g.data(), &[0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_log_softmax_rows_normalise() {
        let mut layer = LogSoftmax::new();
        let x = Tensor::from_vec([2, 3, 1, 1], vec![1.0, 2.0, 3.0, 1000.0, 0.0, -1000.0]).unwrap();
        let y = layer.forward(&x, Mode::Eval).unwrap();
        for row in y.to_matrix().data {
            let total: f64 = row.iter().map(|v| v.exp()).sum();
            assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_log_softmax_gradient_sums_to_zero() {
        let mut layer = LogSoftmax::new();
        let x = Tensor::from_vec([1, 3, 1, 1], vec![0.2, -0.4, 1.5]).unwrap();
        layer.forward(&x, Mode::Train).unwrap();
        let g = layer.backward(&Tensor::from_vec([1, 3, 1, 1], vec![0.0, -1.0, 0.0]).unwrap()).unwrap();
        let total: f64 = g.data().iter().sum();
        assert_abs_diff_eq!(total, 0.0, epsilon = 1e-12);
    }
}
