use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

/// Dense 4-D tensor in NCHW layout backed by one flat buffer.
///
/// Feature vectors are represented as `[batch, features, 1, 1]`, which lets
/// convolutional and fully connected layers share one `Layer` interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: [usize; 4],
    data: Vec<f64>,
}

impl Tensor {
    pub fn zeros(shape: [usize; 4]) -> Tensor {
        Tensor {
            shape,
            data: vec![0.0; shape.iter().product()],
        }
    }

    pub fn from_vec(shape: [usize; 4], data: Vec<f64>) -> Result<Tensor> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(Error::LengthMismatch {
                what: "tensor buffer",
                expected,
                actual: data.len(),
            });
        }
        Ok(Tensor { shape, data })
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn batch_size(&self) -> usize {
        self.shape[0]
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat offset of element `(n, c, h, w)`.
    #[inline]
    pub fn offset(&self, n: usize, c: usize, h: usize, w: usize) -> usize {
        let [_, cs, hs, ws] = self.shape;
        ((n * cs + c) * hs + h) * ws + w
    }

    #[inline]
    pub fn at(&self, n: usize, c: usize, h: usize, w: usize) -> f64 {
        self.data[self.offset(n, c, h, w)]
    }

    pub fn map<F>(&self, functor: F) -> Tensor
    where
        F: Fn(f64) -> f64,
    {
        Tensor {
            shape: self.shape,
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    /// Combines two same-shape tensors element by element.
    pub fn zip_map<F>(&self, other: &Tensor, functor: F) -> Tensor
    where
        F: Fn(f64, f64) -> f64,
    {
        assert_eq!(self.shape, other.shape, "Tensors are of incorrect sizes");
        Tensor {
            shape: self.shape,
            data: self.data.iter().zip(other.data.iter()).map(|(&a, &b)| functor(a, b)).collect(),
        }
    }

    pub fn reshape(self, shape: [usize; 4]) -> Result<Tensor> {
        let expected: usize = shape.iter().product();
        if expected != self.data.len() {
            return Err(Error::Shape(format!(
                "cannot reshape {:?} into {:?}",
                self.shape, shape
            )));
        }
        Ok(Tensor { shape, data: self.data })
    }

    /// One row per batch item, `c * h * w` columns.
    pub fn to_matrix(&self) -> Matrix {
        let [n, c, h, w] = self.shape;
        Matrix::from_flat(n, c * h * w, &self.data)
    }

    /// Inverse of `to_matrix` for feature vectors: `[rows, cols, 1, 1]`.
    pub fn from_matrix(m: &Matrix) -> Tensor {
        Tensor {
            shape: [m.rows, m.cols, 1, 1],
            data: m.to_flat(),
        }
    }
}

impl Add for &Tensor {
    type Output = Tensor;

    fn add(self, rhs: &Tensor) -> Tensor {
        self.zip_map(rhs, |a, b| a + b)
    }
}
