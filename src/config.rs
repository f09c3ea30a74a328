//! Run configuration: everything `ferclass train` needs, stored as JSON.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::loss::LossType;
use crate::model::{metadata::InputShape, spec::ModelSpec};
use crate::optim::OptimizerConfig;
use crate::train::TrainConfig;

/// Where the images live and how they are sized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// `train_dir/<class>/<image>`.
    pub train_dir: PathBuf,
    /// Separate validation folder; when absent `val_fraction` of the
    /// training set is held out instead.
    pub val_dir: Option<PathBuf>,
    pub test_dir: Option<PathBuf>,
    pub val_fraction: f64,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            train_dir: PathBuf::from("data/train"),
            val_dir: None,
            test_dir: Some(PathBuf::from("data/test")),
            val_fraction: 0.2,
            channels: 3,
            height: 48,
            width: 48,
        }
    }
}

impl DataConfig {
    pub fn input_shape(&self) -> InputShape {
        InputShape { channels: self.channels, height: self.height, width: self.width }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Used as the checkpoint file stem.
    pub name: String,
    pub model: ModelSpec,
    pub loss: LossType,
    pub optimizer: OptimizerConfig,
    pub training: TrainConfig,
    pub data: DataConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            name: "resnet18".into(),
            model: ModelSpec::default(),
            loss: LossType::CrossEntropy,
            optimizer: OptimizerConfig::default(),
            training: TrainConfig::default(),
            data: DataConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<RunConfig> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Rejects settings that cannot produce a run.
    pub fn validate(&self) -> Result<()> {
        if self.training.epochs == 0 {
            return Err(Error::Config("training.epochs must be at least 1".into()));
        }
        if self.training.batch_size == 0 {
            return Err(Error::Config("training.batch_size must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&self.data.val_fraction) {
            return Err(Error::Config(format!(
                "data.val_fraction must be in [0, 1), got {}",
                self.data.val_fraction
            )));
        }
        if self.data.val_dir.is_none() && self.data.val_fraction == 0.0 {
            return Err(Error::Config("either data.val_dir or a non-zero data.val_fraction is required".into()));
        }
        if self.optimizer.learning_rate() <= 0.0 {
            return Err(Error::Config("optimizer.learning_rate must be positive".into()));
        }
        if self.data.channels != self.model.channels() {
            return Err(Error::Config(format!(
                "model expects {} channels but data provides {}",
                self.model.channels(),
                self.data.channels
            )));
        }
        if let Some(shape) = self.model.fixed_input() {
            if shape != self.data.input_shape() {
                return Err(Error::Config(format!(
                    "model expects {}x{} images, data is resized to {}x{}",
                    shape.height, shape.width, self.data.height, self.data.width
                )));
            }
        }
        match (&self.model, self.loss) {
            (ModelSpec::SmallCnn(_), LossType::CrossEntropy) => {
                warn!("small_cnn ends in log-softmax, nll is the matching loss")
            }
            (ModelSpec::ResNet18(_), LossType::Nll) => {
                warn!("resnet18 outputs raw logits, cross_entropy is the matching loss")
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::small_cnn::SmallCnnConfig;

    #[test]
    fn test_default_is_valid() {
        RunConfig::default().validate().unwrap();
    }

    #[test]
    fn test_roundtrip_through_file() {
        let mut config = RunConfig::default();
        config.training.epochs = 3;
        config.optimizer = OptimizerConfig::Sgd { learning_rate: 0.05, momentum: 0.9 };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        config.save_json(&path).unwrap();
        assert_eq!(RunConfig::load_json(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RunConfig = serde_json::from_str(r#"{"training":{"epochs":2}}"#).unwrap();
        assert_eq!(config.training.epochs, 2);
        assert_eq!(config.training.batch_size, TrainConfig::default().batch_size);
        assert_eq!(config.data, DataConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = RunConfig::default();
        config.training.batch_size = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = RunConfig::default();
        config.data.val_fraction = 1.5;
        assert!(config.validate().is_err());

        let mut config = RunConfig::default();
        config.data.channels = 1;
        assert!(config.validate().is_err());

        let mut config = RunConfig::default();
        config.model = ModelSpec::SmallCnn(SmallCnnConfig::default());
        config.loss = LossType::Nll;
        assert!(config.validate().is_err());
        config.data.height = 28;
        config.data.width = 28;
        config.validate().unwrap();
    }
}
