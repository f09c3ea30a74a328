use crate::{
    error::{Error, Result},
    layers::{conv::{check_window, conv_output_size}, missing_cache, Layer, Mode},
    math::tensor::Tensor,
};

/// Max pooling over square windows. Padded positions never win.
#[derive(Debug)]
pub struct MaxPool2d {
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: usize,
    // Flat input offset of the winning element for every output element.
    winners: Option<(Vec<usize>, [usize; 4])>,
}

impl MaxPool2d {
    pub fn new(kernel_size: usize, stride: usize, padding: usize) -> Result<MaxPool2d> {
        check_window("max pooling", kernel_size, stride)?;
        Ok(MaxPool2d { kernel_size, stride, padding, winners: None })
    }

    pub fn output_size(&self, input: usize) -> Option<usize> {
        conv_output_size(input, self.kernel_size, self.stride, self.padding)
    }
}

impl Layer for MaxPool2d {
    fn forward(&mut self, input: &Tensor, mode: Mode) -> Result<Tensor> {
        let [n, c, h, w] = input.shape();
        let (oh, ow) = match (self.output_size(h), self.output_size(w)) {
            (Some(oh), Some(ow)) => (oh, ow),
            _ => {
                return Err(Error::Shape(format!(
                    "max pool window {} does not fit a {h}x{w} input",
                    self.kernel_size
                )))
            }
        };

        let mut out = Tensor::zeros([n, c, oh, ow]);
        let mut winners = Vec::with_capacity(out.len());
        for b in 0..n {
            for ch in 0..c {
                for y in 0..oh {
                    for x in 0..ow {
                        let mut best = f64::NEG_INFINITY;
                        let mut best_idx = None;
                        for kh in 0..self.kernel_size {
                            let Some(ih) = (y * self.stride + kh)
                                .checked_sub(self.padding)
                                .filter(|&v| v < h) else { continue };
                            for kw in 0..self.kernel_size {
                                let Some(iw) = (x * self.stride + kw)
                                    .checked_sub(self.padding)
                                    .filter(|&v| v < w) else { continue };
                                let idx = input.offset(b, ch, ih, iw);
                                let v = input.data()[idx];
                                if best_idx.is_none() || v > best {
                                    best = v;
                                    best_idx = Some(idx);
                                }
                            }
                        }
                        let idx = out.offset(b, ch, y, x);
                        out.data_mut()[idx] = best;
                        winners.push(best_idx.unwrap_or(usize::MAX));
                    }
                }
            }
        }

        self.winners = (mode == Mode::Train).then(|| (winners, input.shape()));
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let (winners, shape) = self.winners.as_ref().ok_or_else(|| missing_cache("max_pool2d"))?;
        if winners.len() != grad_output.len() {
            return Err(Error::Shape("max pool gradient shape mismatch".into()));
        }
        let mut grad_input = Tensor::zeros(*shape);
        for (&idx, &g) in winners.iter().zip(grad_output.data().iter()) {
            if let Some(slot) = grad_input.data_mut().get_mut(idx) {
                *slot += g;
            }
        }
        Ok(grad_input)
    }
}

/// Adaptive average pooling to a 1x1 spatial output.
#[derive(Debug, Default)]
pub struct GlobalAvgPool {
    input_shape: Option<[usize; 4]>,
}

impl GlobalAvgPool {
    pub fn new() -> GlobalAvgPool {
        GlobalAvgPool::default()
    }
}

impl Layer for GlobalAvgPool {
    fn forward(&mut self, input: &Tensor, mode: Mode) -> Result<Tensor> {
        let [n, c, h, w] = input.shape();
        let area = (h * w).max(1) as f64;
        let data = input
            .data()
            .chunks((h * w).max(1))
            .take(n * c)
            .map(|plane| plane.iter().sum::<f64>() / area)
            .collect();
        self.input_shape = (mode == Mode::Train).then_some(input.shape());
        Tensor::from_vec([n, c, 1, 1], data)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let [n, c, h, w] = self.input_shape.ok_or_else(|| missing_cache("global_avg_pool"))?;
        if grad_output.len() != n * c {
            return Err(Error::Shape("global average pool gradient shape mismatch".into()));
        }
        let area = h * w;
        let data = grad_output
            .data()
            .iter()
            .flat_map(|&g| std::iter::repeat(g / area as f64).take(area))
            .collect();
        Tensor::from_vec([n, c, h, w], data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_stride() {
        assert!(matches!(MaxPool2d::new(2, 0, 0), Err(Error::Config(_))));
    }

    #[test]
    fn test_max_pool_routes_gradient_to_winner() {
        let mut pool = MaxPool2d::new(2, 2, 0).unwrap();
        let x = Tensor::from_vec([1, 1, 2, 4], vec![1.0, 5.0, 2.0, 0.0, 3.0, 4.0, 8.0, 1.0]).unwrap();
        let y = pool.forward(&x, Mode::Train).unwrap();
        assert_eq!(y.data(), &[5.0, 8.0]);
        let g = pool.backward(&Tensor::from_vec([1, 1, 1, 2], vec![1.0, 2.0]).unwrap()).unwrap();
        assert_eq!(g.data(), &[0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_max_pool_stride_one_and_padding() {
        let mut pool = MaxPool2d::new(2, 1, 0).unwrap();
        let x = Tensor::from_vec([1, 1, 3, 3], (1..=9).map(f64::from).collect()).unwrap();
        assert_eq!(pool.forward(&x, Mode::Eval).unwrap().data(), &[5.0, 6.0, 8.0, 9.0]);

        let mut padded = MaxPool2d::new(3, 2, 1).unwrap();
        let neg = Tensor::from_vec([1, 1, 2, 2], vec![-4.0, -3.0, -2.0, -1.0]).unwrap();
        assert_eq!(padded.forward(&neg, Mode::Eval).unwrap().data(), &[-1.0]);
    }

    #[test]
    fn test_global_avg_pool() {
        let mut pool = GlobalAvgPool::new();
        let x = Tensor::from_vec([1, 2, 2, 2], vec![1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 8.0]).unwrap();
        let y = pool.forward(&x, Mode::Train).unwrap();
        assert_eq!(y.data(), &[2.5, 2.0]);
        let g = pool.backward(&Tensor::from_vec([1, 2, 1, 1], vec![4.0, 8.0]).unwrap()).unwrap();
        assert_eq!(g.data(), &[1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0]);
    }
}
