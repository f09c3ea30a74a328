pub mod adam;
pub mod sgd;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layers::NamedParam;
use crate::model::Model;

pub use adam::Adam;
pub use sgd::Sgd;

/// Updates a model's trainable parameters from their accumulated gradients.
///
/// Optimizer state is kept per trainable parameter in `Model::parameters`
/// order, so one optimizer must only ever drive one model.
pub trait Optimizer {
    fn zero_grad(&mut self, model: &mut dyn Model) {
        for p in model.parameters() {
            p.param.zero_grad();
        }
    }

    fn step(&mut self, model: &mut dyn Model) -> Result<()>;
}

/// Serializable optimizer choice used by the run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Sgd {
        learning_rate: f64,
        #[serde(default)]
        momentum: f64,
    },
    Adam {
        learning_rate: f64,
    },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::Adam { learning_rate: 1e-3 }
    }
}

impl OptimizerConfig {
    pub fn build(self) -> Box<dyn Optimizer> {
        match self {
            OptimizerConfig::Sgd { learning_rate, momentum } => {
                Box::new(Sgd::new(learning_rate).with_momentum(momentum))
            }
            OptimizerConfig::Adam { learning_rate } => Box::new(Adam::new(learning_rate)),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        match *self {
            OptimizerConfig::Sgd { learning_rate, .. } | OptimizerConfig::Adam { learning_rate } => learning_rate,
        }
    }
}

fn check_slots(optimizer: &str, slots: &[Vec<f64>], params: &[NamedParam<'_>]) -> Result<()> {
    let matches = slots.len() == params.len()
        && slots.iter().zip(params.iter()).all(|(s, p)| s.len() == p.param.len());
    if !matches {
        return Err(Error::StateMismatch(format!(
            "{optimizer} state was built for a different parameter layout"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{Mode, Param};
    use crate::math::matrix::Matrix;
    use crate::math::tensor::Tensor;
    use approx::assert_abs_diff_eq;

    /// One trainable weight vector plus one buffer, gradients set by hand.
    struct Toy {
        weight: Param,
        stat: Param,
    }

    impl Toy {
        fn new(weight: Vec<f64>) -> Toy {
            Toy { weight: Param::new(weight), stat: Param::buffer(vec![7.0]) }
        }
    }

    impl Model for Toy {
        fn num_classes(&self) -> usize {
            self.weight.len()
        }
        fn mode(&self) -> Mode {
            Mode::Train
        }
        fn set_mode(&mut self, _mode: Mode) {}
        fn forward(&mut self, images: &Tensor) -> Result<Matrix> {
            Ok(Matrix::zeros(images.batch_size(), self.weight.len()))
        }
        fn backward(&mut self, _grad_scores: &Matrix) -> Result<()> {
            Ok(())
        }
        fn parameters(&mut self) -> Vec<NamedParam<'_>> {
            vec![
                NamedParam { name: "weight".into(), param: &mut self.weight },
                NamedParam { name: "stat".into(), param: &mut self.stat },
            ]
        }
    }

    #[test]
    fn test_sgd_plain_step() {
        let mut toy = Toy::new(vec![1.0, -1.0]);
        toy.weight.grad = vec![0.5, -2.0];
        Sgd::new(0.1).step(&mut toy).unwrap();
        assert_abs_diff_eq!(toy.weight.value[0], 0.95, epsilon = 1e-12);
        assert_abs_diff_eq!(toy.weight.value[1], -0.8, epsilon = 1e-12);
        assert_eq!(toy.stat.value, vec![7.0]);
    }

    #[test]
    fn test_sgd_momentum_accumulates_velocity() {
        let mut toy = Toy::new(vec![0.0]);
        let mut sgd = Sgd::new(1.0).with_momentum(0.5);
        toy.weight.grad = vec![1.0];
        sgd.step(&mut toy).unwrap();
        sgd.step(&mut toy).unwrap();
        // v1 = 1, v2 = 1.5
        assert_abs_diff_eq!(toy.weight.value[0], -2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_adam_first_step_moves_by_learning_rate() {
        let mut toy = Toy::new(vec![1.0, 1.0]);
        toy.weight.grad = vec![3.0, -0.01];
        let mut adam = Adam::new(0.01);
        adam.step(&mut toy).unwrap();
        assert_eq!(adam.steps(), 1);
        assert_abs_diff_eq!(toy.weight.value[0], 0.99, epsilon = 1e-6);
        assert_abs_diff_eq!(toy.weight.value[1], 1.01, epsilon = 1e-6);
        assert_eq!(toy.stat.value, vec![7.0]);
    }

    #[test]
    fn test_state_is_tied_to_layout() {
        let mut adam = Adam::new(0.01);
        adam.step(&mut Toy::new(vec![1.0, 2.0])).unwrap();
        assert!(matches!(adam.step(&mut Toy::new(vec![1.0])), Err(Error::StateMismatch(_))));
    }

    #[test]
    fn test_zero_grad_clears_all() {
        let mut toy = Toy::new(vec![1.0]);
        toy.weight.grad = vec![4.0];
        Sgd::new(0.1).zero_grad(&mut toy);
        assert_eq!(toy.weight.grad, vec![0.0]);
    }

    #[test]
    fn test_config_roundtrip() {
        let config: OptimizerConfig = serde_json::from_str(r#"{"kind":"sgd","learning_rate":0.01}"#).unwrap();
        assert_eq!(config, OptimizerConfig::Sgd { learning_rate: 0.01, momentum: 0.0 });
        assert_eq!(config.learning_rate(), 0.01);
    }
}
