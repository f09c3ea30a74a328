use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layers::{
    Activation, BatchNorm2d, Conv2d, Dense, Flatten, GlobalAvgPool, Layer, MaxPool2d, Mode,
    NamedParam, Sequential,
};
use crate::activation::ActivationFunction;
use crate::math::{matrix::Matrix, tensor::Tensor};
use crate::model::{check_input, scores_from, Model};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResNetConfig {
    pub channels: usize,
    pub num_classes: usize,
    /// Width of the first stage; later stages double it.
    pub base_width: usize,
    /// Number of basic blocks in each of the four stages.
    pub blocks: [usize; 4],
}

impl Default for ResNetConfig {
    fn default() -> Self {
        ResNetConfig {
            channels: 3,
            num_classes: 7,
            base_width: 64,
            blocks: [2, 2, 2, 2],
        }
    }
}

/// Two 3×3 conv/BN pairs with an identity or projection shortcut:
/// `relu(bn2(conv2(relu(bn1(conv1(x))))) + shortcut(x))`.
pub struct BasicBlock {
    branch: Sequential,
    shortcut: Option<Sequential>,
    out_relu: Activation,
}

impl BasicBlock {
    pub fn new(in_channels: usize, out_channels: usize, stride: usize) -> Result<BasicBlock> {
        let branch = Sequential::new()
            .with("conv1", Conv2d::new(in_channels, out_channels, 3, stride, 1, false)?)
            .with("bn1", BatchNorm2d::new(out_channels))
            .with("relu", Activation::relu())
            .with("conv2", Conv2d::new(out_channels, out_channels, 3, 1, 1, false)?)
            .with("bn2", BatchNorm2d::new(out_channels));

        let shortcut = if stride != 1 || in_channels != out_channels {
            Some(
                Sequential::new()
                    .with("0", Conv2d::new(in_channels, out_channels, 1, stride, 0, false)?)
                    .with("1", BatchNorm2d::new(out_channels)),
            )
        } else {
            None
        };

        Ok(BasicBlock { branch, shortcut, out_relu: Activation::relu() })
    }
}

impl Layer for BasicBlock {
    fn forward(&mut self, input: &Tensor, mode: Mode) -> Result<Tensor> {
        let main = self.branch.forward(input, mode)?;
        let skip = match self.shortcut.as_mut() {
            Some(projection) => projection.forward(input, mode)?,
            None => input.clone(),
        };
        if main.shape() != skip.shape() {
            return Err(Error::Shape(format!(
                "residual branch {:?} does not match shortcut {:?}",
                main.shape(),
                skip.shape()
            )));
        }
        self.out_relu.forward(&(&main + &skip), mode)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let grad_sum = self.out_relu.backward(grad_output)?;
        let grad_main = self.branch.backward(&grad_sum)?;
        let grad_skip = match self.shortcut.as_mut() {
            Some(projection) => projection.backward(&grad_sum)?,
            None => grad_sum,
        };
        Ok(&grad_main + &grad_skip)
    }

    fn collect_params<'a>(&'a mut self, prefix: &str, out: &mut Vec<NamedParam<'a>>) {
        self.branch.collect_params(prefix, out);
        if let Some(projection) = self.shortcut.as_mut() {
            projection.collect_params(&format!("{prefix}shortcut."), out);
        }
    }
}

/// ResNet-18: 7×7 stem, four stages of basic blocks, global average pool
/// and a linear classifier producing raw logits.
pub struct ResNet18 {
    config: ResNetConfig,
    net: Sequential,
    mode: Mode,
}

impl ResNet18 {
    pub fn new(config: ResNetConfig) -> Result<ResNet18> {
        if config.num_classes == 0 || config.channels == 0 || config.base_width == 0 {
            return Err(Error::Config(
                "resnet needs at least one class, one input channel and a non-zero width".into(),
            ));
        }
        if config.blocks.iter().any(|&b| b == 0) {
            return Err(Error::Config("every resnet stage needs at least one block".into()));
        }

        let w = config.base_width;
        let mut net = Sequential::new()
            .with("conv1", Conv2d::new(config.channels, w, 7, 2, 1, false)?)
            .with("bn1", BatchNorm2d::new(w))
            .with("relu", Activation::relu())
            .with("maxpool", MaxPool2d::new(3, 2, 1)?);

        let mut in_channels = w;
        let widths = [w, w * 2, w * 4, w * 8];
        let first_strides = [1, 2, 2, 2];
        for (stage, ((&out_channels, &stride), &n_blocks)) in widths
            .iter()
            .zip(first_strides.iter())
            .zip(config.blocks.iter())
            .enumerate()
        {
            let mut layer = Sequential::new();
            let strides = std::iter::once(stride).chain(std::iter::repeat(1).take(n_blocks - 1));
            for (i, s) in strides.enumerate() {
                layer.push(i.to_string(), BasicBlock::new(in_channels, out_channels, s)?);
                in_channels = out_channels;
            }
            net.push(format!("layer{}", stage + 1), layer);
        }

        let net = net
            .with("avgpool", GlobalAvgPool::new())
            .with("flat", Flatten::new())
            .with("fc", Dense::new(config.num_classes, in_channels, ActivationFunction::Identity));

        Ok(ResNet18 { config, net, mode: Mode::Train })
    }

    pub fn config(&self) -> &ResNetConfig {
        &self.config
    }
}

impl Model for ResNet18 {
    fn num_classes(&self) -> usize {
        self.config.num_classes
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn forward(&mut self, images: &Tensor) -> Result<Matrix> {
        check_input(images, self.config.channels)?;
        let out = self.net.forward(images, self.mode)?;
        scores_from(out, self.config.num_classes)
    }

    fn backward(&mut self, grad_scores: &Matrix) -> Result<()> {
        self.net.backward(&Tensor::from_matrix(grad_scores))?;
        Ok(())
    }

    fn parameters(&mut self) -> Vec<NamedParam<'_>> {
        let mut out = Vec::new();
        self.net.collect_params("", &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> ResNetConfig {
        ResNetConfig { channels: 1, num_classes: 4, base_width: 2, blocks: [1, 1, 1, 1] }
    }

    #[test]
    fn test_forward_shape_on_small_images() {
        let mut model = ResNet18::new(tiny()).unwrap();
        let images = Tensor::from_vec([2, 1, 16, 16], (0..512).map(|v| (v % 5) as f64 * 0.2).collect()).unwrap();
        let scores = model.forward(&images).unwrap();
        assert_eq!((scores.rows, scores.cols), (2, 4));
        model.backward(&Matrix::from_data(vec![vec![0.1; 4]; 2])).unwrap();
    }

    #[test]
    fn test_projection_shortcuts_are_named() {
        let mut model = ResNet18::new(ResNetConfig { base_width: 2, ..ResNetConfig::default() }).unwrap();
        let state = model.state_dict();
        assert!(state.tensors.contains_key("layer1.0.conv1.weight"));
        assert!(state.tensors.contains_key("layer1.1.bn2.running_var"));
        assert!(state.tensors.contains_key("layer2.0.shortcut.0.weight"));
        assert!(!state.tensors.contains_key("layer1.0.shortcut.0.weight"));
        assert!(state.tensors.contains_key("fc.weight"));
    }

    #[test]
    fn test_zero_blocks_rejected() {
        let config = ResNetConfig { blocks: [2, 0, 2, 2], ..tiny() };
        assert!(matches!(ResNet18::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_wrong_channel_count_is_rejected() {
        let mut model = ResNet18::new(tiny()).unwrap();
        assert!(matches!(model.forward(&Tensor::zeros([1, 3, 16, 16])), Err(Error::Shape(_))));
    }
}
