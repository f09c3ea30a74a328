use crate::error::Result;
use crate::model::Model;
use crate::optim::{check_slots, Optimizer};

/// Stochastic gradient descent with optional classical momentum.
///
/// `v = momentum * v + grad; w -= learning_rate * v`
pub struct Sgd {
    pub learning_rate: f64,
    pub momentum: f64,
    velocity: Vec<Vec<f64>>,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate, momentum: 0.0, velocity: Vec::new() }
    }

    pub fn with_momentum(mut self, momentum: f64) -> Sgd {
        self.momentum = momentum;
        self
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, model: &mut dyn Model) -> Result<()> {
        let mut params = model.parameters();
        params.retain(|p| p.param.trainable);

        if self.momentum == 0.0 {
            for p in params {
                for (w, g) in p.param.value.iter_mut().zip(p.param.grad.iter()) {
                    *w -= self.learning_rate * g;
                }
            }
            return Ok(());
        }

        if self.velocity.is_empty() {
            self.velocity = params.iter().map(|p| vec![0.0; p.param.len()]).collect();
        }
        check_slots("sgd", &self.velocity, &params)?;

        for (p, v) in params.into_iter().zip(self.velocity.iter_mut()) {
            for ((w, g), vi) in p.param.value.iter_mut().zip(p.param.grad.iter()).zip(v.iter_mut()) {
                *vi = self.momentum * *vi + g;
                *w -= self.learning_rate * *vi;
            }
        }
        Ok(())
    }
}
