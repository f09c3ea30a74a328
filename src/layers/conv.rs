use crate::{
    error::{Error, Result},
    layers::{missing_cache, Layer, Mode, NamedParam, Param},
    math::{matrix::Matrix, tensor::Tensor},
};

/// 2-D convolution with square kernels, stride and zero padding.
///
/// Weights are laid out `[out_channels, in_channels, k, k]`.
#[derive(Debug)]
pub struct Conv2d {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: usize,
    pub weights: Param,
    pub bias: Option<Param>,
    input: Option<Tensor>,
}

impl Conv2d {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
        bias: bool,
    ) -> Result<Conv2d> {
        check_window("convolution", kernel_size, stride)?;
        let fan_in = in_channels * kernel_size * kernel_size;
        let weights = Matrix::he(out_channels, fan_in, fan_in);
        Ok(Conv2d {
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
            weights: Param::new(weights.to_flat()),
            bias: bias.then(|| Param::new(vec![0.0; out_channels])),
            input: None,
        })
    }

    /// Spatial output size along one axis, `None` when the kernel does not fit.
    pub fn output_size(&self, input: usize) -> Option<usize> {
        conv_output_size(input, self.kernel_size, self.stride, self.padding)
    }

    #[inline]
    fn weight_index(&self, o: usize, i: usize, kh: usize, kw: usize) -> usize {
        ((o * self.in_channels + i) * self.kernel_size + kh) * self.kernel_size + kw
    }

    /// Input coordinate hit by output position `out` and kernel tap `k`,
    /// `None` when it falls into the zero padding.
    #[inline]
    fn input_coord(&self, out: usize, k: usize, limit: usize) -> Option<usize> {
        (out * self.stride + k).checked_sub(self.padding).filter(|&c| c < limit)
    }
}

pub(crate) fn check_window(layer: &str, kernel_size: usize, stride: usize) -> Result<()> {
    if kernel_size == 0 || stride == 0 {
        return Err(Error::Config(format!(
            "{layer} needs a non-zero kernel and stride, got kernel {kernel_size} stride {stride}"
        )));
    }
    Ok(())
}

pub(crate) fn conv_output_size(input: usize, kernel: usize, stride: usize, padding: usize) -> Option<usize> {
    let padded = input + 2 * padding;
    if padded < kernel || stride == 0 {
        return None;
    }
    Some((padded - kernel) / stride + 1)
}

impl Layer for Conv2d {
    fn forward(&mut self, input: &Tensor, mode: Mode) -> Result<Tensor> {
        let [n, c, h, w] = input.shape();
        if c != self.in_channels {
            return Err(Error::Shape(format!(
                "conv2d expects {} input channels, got {}",
                self.in_channels, c
            )));
        }
        let (oh, ow) = match (self.output_size(h), self.output_size(w)) {
            (Some(oh), Some(ow)) => (oh, ow),
            _ => {
                return Err(Error::Shape(format!(
                    "conv2d kernel {} does not fit a {h}x{w} input",
                    self.kernel_size
                )))
            }
        };

        let mut out = Tensor::zeros([n, self.out_channels, oh, ow]);
        let k = self.kernel_size;
        for b in 0..n {
            for o in 0..self.out_channels {
                let bias = self.bias.as_ref().map_or(0.0, |p| p.value[o]);
                for y in 0..oh {
                    for x in 0..ow {
                        let mut acc = bias;
                        for i in 0..c {
                            for kh in 0..k {
                                let Some(ih) = self.input_coord(y, kh, h) else { continue };
                                for kw in 0..k {
                                    let Some(iw) = self.input_coord(x, kw, w) else { continue };
                                    acc += self.weights.value[self.weight_index(o, i, kh, kw)]
                                        * input.at(b, i, ih, iw);
                                }
                            }
                        }
                        let idx = out.offset(b, o, y, x);
                        out.data_mut()[idx] = acc;
                    }
                }
            }
        }

        self.input = (mode == Mode::Train).then(|| input.clone());
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let input = self.input.as_ref().ok_or_else(|| missing_cache("conv2d"))?;
        let [n, c, h, w] = input.shape();
        let [gn, go, oh, ow] = grad_output.shape();
        if gn != n || go != self.out_channels {
            return Err(Error::Shape("conv2d gradient shape mismatch".into()));
        }

        let k = self.kernel_size;
        let mut grad_input = Tensor::zeros([n, c, h, w]);
        let mut weights_grad = vec![0.0; self.weights.len()];
        let mut bias_grad = vec![0.0; self.out_channels];

        for b in 0..n {
            for o in 0..self.out_channels {
                for y in 0..oh {
                    for x in 0..ow {
                        let g = grad_output.at(b, o, y, x);
                        if g == 0.0 {
                            continue;
                        }
                        bias_grad[o] += g;
                        for i in 0..c {
                            for kh in 0..k {
                                let Some(ih) = self.input_coord(y, kh, h) else { continue };
                                for kw in 0..k {
                                    let Some(iw) = self.input_coord(x, kw, w) else { continue };
                                    let wi = self.weight_index(o, i, kh, kw);
                                    weights_grad[wi] += g * input.at(b, i, ih, iw);
                                    let gi = grad_input.offset(b, i, ih, iw);
                                    grad_input.data_mut()[gi] += g * self.weights.value[wi];
                                }
                            }
                        }
                    }
                }
            }
        }

        self.weights.accumulate(&weights_grad);
        if let Some(bias) = self.bias.as_mut() {
            bias.accumulate(&bias_grad);
        }
        Ok(grad_input)
    }

    fn collect_params<'a>(&'a mut self, prefix: &str, out: &mut Vec<NamedParam<'a>>) {
        out.push(NamedParam { name: format!("{prefix}weight"), param: &mut self.weights });
        if let Some(bias) = self.bias.as_mut() {
            out.push(NamedParam { name: format!("{prefix}bias"), param: bias });
        }
    }
}
