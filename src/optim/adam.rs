use crate::error::Result;
use crate::model::Model;
use crate::optim::{check_slots, Optimizer};

/// Adam with bias-corrected first and second moment estimates.
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    t: i32,
    m: Vec<Vec<f64>>,
    v: Vec<Vec<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Adam {
        Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Number of updates applied so far.
    pub fn steps(&self) -> i32 {
        self.t
    }
}

impl Optimizer for Adam {
    fn step(&mut self, model: &mut dyn Model) -> Result<()> {
        let mut params = model.parameters();
        params.retain(|p| p.param.trainable);

        if self.m.is_empty() {
            self.m = params.iter().map(|p| vec![0.0; p.param.len()]).collect();
            self.v = self.m.clone();
        }
        check_slots("adam", &self.m, &params)?;

        self.t += 1;
        let correction1 = 1.0 - self.beta1.powi(self.t);
        let correction2 = 1.0 - self.beta2.powi(self.t);

        for ((p, m), v) in params.into_iter().zip(self.m.iter_mut()).zip(self.v.iter_mut()) {
            for i in 0..p.param.len() {
                let g = p.param.grad[i];
                m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
                v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;
                let m_hat = m[i] / correction1;
                let v_hat = v[i] / correction2;
                p.param.value[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
            }
        }
        Ok(())
    }
}
