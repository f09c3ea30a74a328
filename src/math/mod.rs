pub mod matrix;
pub mod tensor;

pub use matrix::{argmax, Matrix};
pub use tensor::Tensor;
