use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::model::{
    metadata::InputShape,
    resnet::{ResNet18, ResNetConfig},
    small_cnn::{SmallCnn, SmallCnnConfig},
    Model,
};

/// A fully serializable description of a model architecture.
///
/// Stored next to the trained weights in a checkpoint so a model can be
/// rebuilt before its parameters are loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "arch", rename_all = "snake_case")]
pub enum ModelSpec {
    SmallCnn(SmallCnnConfig),
    #[serde(rename = "resnet18")]
    ResNet18(ResNetConfig),
}

impl Default for ModelSpec {
    fn default() -> Self {
        ModelSpec::ResNet18(ResNetConfig::default())
    }
}

impl ModelSpec {
    /// Builds a freshly initialised model.
    pub fn build(&self) -> Result<Box<dyn Model>> {
        Ok(match self {
            ModelSpec::SmallCnn(config) => Box::new(SmallCnn::new(config.clone())?),
            ModelSpec::ResNet18(config) => Box::new(ResNet18::new(config.clone())?),
        })
    }

    pub fn num_classes(&self) -> usize {
        match self {
            ModelSpec::SmallCnn(config) => config.num_classes,
            ModelSpec::ResNet18(config) => config.num_classes,
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            ModelSpec::SmallCnn(config) => config.channels,
            ModelSpec::ResNet18(config) => config.channels,
        }
    }

    /// The exact input size the architecture requires, if it has one.
    /// ResNet ends in a global pool and accepts any size large enough.
    pub fn fixed_input(&self) -> Option<InputShape> {
        match self {
            ModelSpec::SmallCnn(config) => Some(InputShape {
                channels: config.channels,
                height: config.height,
                width: config.width,
            }),
            ModelSpec::ResNet18(_) => None,
        }
    }
}
