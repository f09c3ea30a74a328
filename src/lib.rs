pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod model;
pub mod loss;
pub mod optim;
pub mod data;
pub mod eval;
pub mod train;
pub mod config;

// Convenience re-exports
pub use error::{Error, Result};
pub use math::{matrix::Matrix, tensor::Tensor};
pub use activation::activation::ActivationFunction;
pub use layers::Mode;
pub use model::{Checkpoint, Model, ModelSpec, ModelState};
pub use loss::{LossFunction, LossType};
pub use optim::{Optimizer, OptimizerConfig};
pub use data::{DataLoader, ImageDataset};
pub use eval::{evaluate, finalize, predict, AggregateMetrics, ConfusionCounts};
pub use train::{fit, EarlyStopper, EarlyStoppingState, TrainConfig};
pub use config::RunConfig;
