use crate::{
    error::{Error, Result},
    layers::{missing_cache, Layer, Mode, NamedParam, Param},
    math::tensor::Tensor,
};

const MOMENTUM: f64 = 0.1;
const EPS: f64 = 1e-5;

/// Per-channel batch normalisation for NCHW tensors.
///
/// `Train` normalises with the statistics of the current batch and updates
/// the running estimates; `Eval` normalises with the running estimates.
#[derive(Debug)]
pub struct BatchNorm2d {
    pub channels: usize,
    pub gamma: Param,
    pub beta: Param,
    pub running_mean: Param,
    pub running_var: Param,
    cache: Option<BatchNormCache>,
}

#[derive(Debug)]
struct BatchNormCache {
    x_hat: Tensor,
    inv_std: Vec<f64>,
}

impl BatchNorm2d {
    pub fn new(channels: usize) -> BatchNorm2d {
        BatchNorm2d {
            channels,
            gamma: Param::new(vec![1.0; channels]),
            beta: Param::new(vec![0.0; channels]),
            running_mean: Param::buffer(vec![0.0; channels]),
            running_var: Param::buffer(vec![1.0; channels]),
            cache: None,
        }
    }

    fn channel_values<'t>(t: &'t Tensor, c: usize) -> impl Iterator<Item = (usize, f64)> + 't {
        let [n, _, h, w] = t.shape();
        (0..n).flat_map(move |b| {
            let start = t.offset(b, c, 0, 0);
            (start..start + h * w).map(move |i| (i, t.data()[i]))
        })
    }
}

impl Layer for BatchNorm2d {
    fn forward(&mut self, input: &Tensor, mode: Mode) -> Result<Tensor> {
        let [n, c, h, w] = input.shape();
        if c != self.channels {
            return Err(Error::Shape(format!(
                "batch norm expects {} channels, got {c}",
                self.channels
            )));
        }
        let count = n * h * w;
        let mut out = Tensor::zeros(input.shape());

        if mode == Mode::Eval {
            self.cache = None;
            for ch in 0..c {
                let inv_std = 1.0 / (self.running_var.value[ch] + EPS).sqrt();
                let (g, b, m) = (self.gamma.value[ch], self.beta.value[ch], self.running_mean.value[ch]);
                for (i, x) in Self::channel_values(input, ch) {
                    out.data_mut()[i] = g * (x - m) * inv_std + b;
                }
            }
            return Ok(out);
        }

        if count == 0 {
            return Err(Error::Shape("batch norm needs at least one value per channel".into()));
        }

        let mut x_hat = Tensor::zeros(input.shape());
        let mut inv_stds = Vec::with_capacity(c);
        for ch in 0..c {
            let mean = Self::channel_values(input, ch).map(|(_, x)| x).sum::<f64>() / count as f64;
            let var = Self::channel_values(input, ch)
                .map(|(_, x)| (x - mean).powi(2))
                .sum::<f64>()
                / count as f64;
            let inv_std = 1.0 / (var + EPS).sqrt();

            for (i, x) in Self::channel_values(input, ch) {
                let xh = (x - mean) * inv_std;
                x_hat.data_mut()[i] = xh;
                out.data_mut()[i] = self.gamma.value[ch] * xh + self.beta.value[ch];
            }

            // Running variance tracks the unbiased estimate.
            let unbiased = if count > 1 { var * count as f64 / (count - 1) as f64 } else { var };
            self.running_mean.value[ch] = (1.0 - MOMENTUM) * self.running_mean.value[ch] + MOMENTUM * mean;
            self.running_var.value[ch] = (1.0 - MOMENTUM) * self.running_var.value[ch] + MOMENTUM * unbiased;
            inv_stds.push(inv_std);
        }

        self.cache = Some(BatchNormCache { x_hat, inv_std: inv_stds });
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let cache = self.cache.as_ref().ok_or_else(|| missing_cache("batch_norm2d"))?;
        if grad_output.shape() != cache.x_hat.shape() {
            return Err(Error::Shape("batch norm gradient shape mismatch".into()));
        }
        let [n, c, h, w] = grad_output.shape();
        let m = (n * h * w) as f64;

        let mut grad_input = Tensor::zeros(grad_output.shape());
        let mut gamma_grad = vec![0.0; c];
        let mut beta_grad = vec![0.0; c];

        for ch in 0..c {
            let mut sum_g = 0.0;
            let mut sum_g_xhat = 0.0;
            for (i, g) in Self::channel_values(grad_output, ch) {
                sum_g += g;
                sum_g_xhat += g * cache.x_hat.data()[i];
            }
            gamma_grad[ch] = sum_g_xhat;
            beta_grad[ch] = sum_g;

            // dx = γ·inv_std/m · (m·g − Σg − x̂·Σ(g·x̂))
            let scale = self.gamma.value[ch] * cache.inv_std[ch] / m;
            for (i, g) in Self::channel_values(grad_output, ch) {
                grad_input.data_mut()[i] = scale * (m * g - sum_g - cache.x_hat.data()[i] * sum_g_xhat);
            }
        }

        self.gamma.accumulate(&gamma_grad);
        self.beta.accumulate(&beta_grad);
        Ok(grad_input)
    }

    fn collect_params<'a>(&'a mut self, prefix: &str, out: &mut Vec<NamedParam<'a>>) {
        out.push(NamedParam { name: format!("{prefix}weight"), param: &mut self.gamma });
        out.push(NamedParam { name: format!("{prefix}bias"), param: &mut self.beta });
        out.push(NamedParam { name: format!("{prefix}running_mean"), param: &mut self.running_mean });
        out.push(NamedParam { name: format!("{prefix}running_var"), param: &mut self.running_var });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample() -> Tensor {
        Tensor::from_vec([2, 1, 1, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap()
    }

    #[test]
    fn test_training_output_is_normalised() {
        let mut bn = BatchNorm2d::new(1);
        let y = bn.forward(&sample(), Mode::Train).unwrap();
        let mean: f64 = y.data().iter().sum::<f64>() / 4.0;
        let var: f64 = y.data().iter().map(|v| v * v).sum::<f64>() / 4.0;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(var, 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(bn.running_mean.value[0], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_eval_uses_running_statistics() {
        let mut bn = BatchNorm2d::new(1);
        let y = bn.forward(&sample(), Mode::Eval).unwrap();
        for (a, b) in y.data().iter().zip(sample().data()) {
            assert_abs_diff_eq!(*a, b / (1.0 + EPS).sqrt(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_input_gradient_matches_finite_difference() {
        let weights = [0.3, -1.2, 0.7, 2.0];
        let loss = |bn: &mut BatchNorm2d, x: &Tensor| -> f64 {
            let y = bn.forward(x, Mode::Train).unwrap();
            y.data().iter().zip(weights.iter()).map(|(a, b)| a * b).sum()
        };

        let mut bn = BatchNorm2d::new(1);
        let x = sample();
        bn.forward(&x, Mode::Train).unwrap();
        let g = Tensor::from_vec([2, 1, 1, 2], weights.to_vec()).unwrap();
        let analytic = bn.backward(&g).unwrap();

        let eps = 1e-6;
        for i in 0..4 {
            let mut up = x.clone();
            up.data_mut()[i] += eps;
            let mut down = x.clone();
            down.data_mut()[i] -= eps;
            let numeric = (loss(&mut bn, &up) - loss(&mut bn, &down)) / (2.0 * eps);
            assert_abs_diff_eq!(analytic.data()[i], numeric, epsilon = 1e-5);
        }
    }
}
