use serde::{Deserialize, Serialize};

use crate::activation::ActivationFunction;
use crate::error::{Error, Result};
use crate::layers::{
    conv::conv_output_size, Activation, Conv2d, Dense, Flatten, Layer, LogSoftmax, MaxPool2d,
    Mode, NamedParam, Sequential,
};
use crate::math::{matrix::Matrix, tensor::Tensor};
use crate::model::{check_input, scores_from, Model};

/// Geometry of the small network.
///
/// The defaults take 28×28 RGB images and produce 7 log-probabilities:
///
/// ```text
/// conv3x3(3→16) ReLU → conv5x5(16→64) ReLU → maxpool2 (stride 1)
/// → conv3x3(64→128) ReLU → maxpool2 (stride 2) → flatten (128·9·9)
/// → fc 6400 ReLU → fc 1280 ReLU → fc 7 → log_softmax
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmallCnnConfig {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub num_classes: usize,
    pub conv_channels: [usize; 3],
    pub hidden: [usize; 2],
    pub activation: ActivationFunction,
}

impl Default for SmallCnnConfig {
    fn default() -> Self {
        SmallCnnConfig {
            channels: 3,
            height: 28,
            width: 28,
            num_classes: 7,
            conv_channels: [16, 64, 128],
            hidden: [6_400, 1_280],
            activation: ActivationFunction::ReLU,
        }
    }
}

impl SmallCnnConfig {
    /// Spatial size after the feature extractor, `None` if the input is too small.
    fn feature_size(&self, input: usize) -> Option<usize> {
        let s = conv_output_size(input, 3, 1, 0)?;
        let s = conv_output_size(s, 5, 1, 0)?;
        let s = conv_output_size(s, 2, 1, 0)?;
        let s = conv_output_size(s, 3, 1, 0)?;
        conv_output_size(s, 2, 2, 0)
    }

    /// Width of the flattened feature vector fed to the first dense layer.
    pub fn flat_features(&self) -> Result<usize> {
        match (self.feature_size(self.height), self.feature_size(self.width)) {
            (Some(h), Some(w)) => Ok(self.conv_channels[2] * h * w),
            _ => Err(Error::Config(format!(
                "a {}x{} input is too small for the small CNN",
                self.height, self.width
            ))),
        }
    }
}

pub struct SmallCnn {
    config: SmallCnnConfig,
    net: Sequential,
    mode: Mode,
}

impl SmallCnn {
    pub fn new(config: SmallCnnConfig) -> Result<SmallCnn> {
        if config.num_classes == 0 || config.channels == 0 {
            return Err(Error::Config("small CNN needs at least one class and one channel".into()));
        }
        let flat = config.flat_features()?;
        let [c1, c2, c3] = config.conv_channels;
        let [h1, h2] = config.hidden;
        let act = config.activation;

        let net = Sequential::new()
            .with("conv1", Conv2d::new(config.channels, c1, 3, 1, 0, true)?)
            .with("act1", Activation::new(act))
            .with("conv2", Conv2d::new(c1, c2, 5, 1, 0, true)?)
            .with("act2", Activation::new(act))
            .with("pool1", MaxPool2d::new(2, 1, 0)?)
            .with("conv3", Conv2d::new(c2, c3, 3, 1, 0, true)?)
            .with("act3", Activation::new(act))
            .with("pool2", MaxPool2d::new(2, 2, 0)?)
            .with("flat", Flatten::new())
            .with("fc1", Dense::new(h1, flat, act))
            .with("fc2", Dense::new(h2, h1, act))
            .with("fc3", Dense::new(config.num_classes, h2, ActivationFunction::Identity))
            .with("log_softmax", LogSoftmax::new());

        Ok(SmallCnn { config, net, mode: Mode::Train })
    }

    pub fn config(&self) -> &SmallCnnConfig {
        &self.config
    }
}

impl Model for SmallCnn {
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
        let [_, _, h, w] = images.shape();
        if (h, w) != (self.config.height, self.config.width) {
            return Err(Error::Shape(format!(
                "small CNN is built for {}x{} images, got {h}x{w}",
                self.config.height, self.config.width
            )));
        }
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
    use approx::assert_abs_diff_eq;

    fn tiny_config() -> SmallCnnConfig {
        SmallCnnConfig {
            channels: 1,
            height: 12,
            width: 12,
            num_classes: 3,
            conv_channels: [2, 3, 4],
            hidden: [8, 6],
            activation: ActivationFunction::ReLU,
        }
    }

    #[test]
    fn test_default_geometry_matches_reference_width() {
        assert_eq!(SmallCnnConfig::default().flat_features().unwrap(), 10_368);
    }

    #[test]
    fn test_too_small_input_is_rejected() {
        let config = SmallCnnConfig { height: 8, width: 8, ..tiny_config() };
        assert!(matches!(SmallCnn::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_forward_outputs_log_probabilities() {
        let mut model = SmallCnn::new(tiny_config()).unwrap();
        model.set_mode(Mode::Eval);
        let images = Tensor::from_vec([2, 1, 12, 12], (0..288).map(|v| (v % 7) as f64 / 7.0).collect()).unwrap();
        let scores = model.forward(&images).unwrap();
        assert_eq!((scores.rows, scores.cols), (2, 3));
        for row in &scores.data {
            assert_abs_diff_eq!(row.iter().map(|v| v.exp()).sum::<f64>(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_wrong_image_size_is_a_shape_error() {
        let mut model = SmallCnn::new(tiny_config()).unwrap();
        let images = Tensor::zeros([1, 1, 10, 10]);
        assert!(matches!(model.forward(&images), Err(Error::Shape(_))));
    }

    #[test]
    fn test_state_dict_round_trip() {
        let mut a = SmallCnn::new(tiny_config()).unwrap();
        let mut b = SmallCnn::new(tiny_config()).unwrap();
        let state = a.state_dict();
        assert!(state.tensors.contains_key("conv1.weight"));
        assert!(state.tensors.contains_key("fc3.bias"));
        b.load_state_dict(&state).unwrap();
        assert_eq!(b.state_dict(), state);
    }
}
