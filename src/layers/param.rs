/// A learnable tensor (or a non-trainable buffer such as batch-norm running
/// statistics) stored flat, together with its accumulated gradient.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub value: Vec<f64>,
    pub grad: Vec<f64>,
    pub trainable: bool,
}

impl Param {
    pub fn new(value: Vec<f64>) -> Param {
        let grad = vec![0.0; value.len()];
        Param { value, grad, trainable: true }
    }

    /// Non-trainable state that is still part of the model snapshot.
    pub fn buffer(value: Vec<f64>) -> Param {
        Param { value, grad: Vec::new(), trainable: false }
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn zero_grad(&mut self) {
        self.grad.iter_mut().for_each(|g| *g = 0.0);
    }

    pub fn accumulate(&mut self, grad: &[f64]) {
        debug_assert_eq!(grad.len(), self.grad.len());
        for (g, d) in self.grad.iter_mut().zip(grad.iter()) {
            *g += d;
        }
    }
}

/// Mutable view of a parameter with its fully qualified name,
/// e.g. `layer1.0.conv1.weight`.
pub struct NamedParam<'a> {
    pub name: String,
    pub param: &'a mut Param,
}
