use serde::{Deserialize, Serialize};

/// Size of the images a model was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl InputShape {
    pub fn len(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Optional annotations attached to a saved model.
/// All fields are Option<> so checkpoints without metadata deserialize cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ModelMetadata {
    pub description: Option<String>,
    pub input: Option<InputShape>,
    /// Human-readable class names in label order (e.g. "angry", "disgust", ...).
    pub class_names: Option<Vec<String>>,
    /// Epoch whose parameters were kept by early stopping.
    pub best_epoch: Option<usize>,
}
