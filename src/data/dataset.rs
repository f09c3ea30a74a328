use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Error, Result};
use crate::model::metadata::InputShape;

/// Labelled images held in memory.
///
/// Each image is stored planar (`c`, then `h`, then `w`) with pixel values in
/// `[0, 1]`, which is the row layout a `Tensor` batch expects.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDataset {
    pub shape: InputShape,
    images: Vec<Vec<f64>>,
    labels: Vec<usize>,
    class_names: Vec<String>,
}

impl ImageDataset {
    pub fn new(
        shape: InputShape,
        images: Vec<Vec<f64>>,
        labels: Vec<usize>,
        class_names: Vec<String>,
    ) -> Result<ImageDataset> {
        if images.len() != labels.len() {
            return Err(Error::LengthMismatch {
                what: "images and labels",
                expected: images.len(),
                actual: labels.len(),
            });
        }
        if let Some(bad) = images.iter().find(|img| img.len() != shape.len()) {
            return Err(Error::LengthMismatch {
                what: "image pixels",
                expected: shape.len(),
                actual: bad.len(),
            });
        }
        if let Some(&label) = labels.iter().find(|&&l| l >= class_names.len()) {
            return Err(Error::InvalidLabel { label, num_classes: class_names.len() });
        }
        Ok(ImageDataset { shape, images, labels, class_names })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn image(&self, index: usize) -> &[f64] {
        &self.images[index]
    }

    pub fn label(&self, index: usize) -> usize {
        self.labels[index]
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Number of samples per class, indexed by label.
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes()];
        for &l in &self.labels {
            counts[l] += 1;
        }
        counts
    }

    /// Randomly moves `fraction` of the samples into a second dataset.
    /// Returns `(remaining, held_out)`; the same seed always yields the same split.
    pub fn split(&self, fraction: f64, seed: u64) -> Result<(ImageDataset, ImageDataset)> {
        if !(0.0..1.0).contains(&fraction) {
            return Err(Error::Config(format!("split fraction must be in [0, 1), got {fraction}")));
        }
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(seed));

        let held = (self.len() as f64 * fraction).round() as usize;
        let (held_idx, rest_idx) = indices.split_at(held);
        Ok((self.subset(rest_idx), self.subset(held_idx)))
    }

    fn subset(&self, indices: &[usize]) -> ImageDataset {
        ImageDataset {
            shape: self.shape,
            images: indices.iter().map(|&i| self.images[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            class_names: self.class_names.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) fn toy_dataset(samples: usize, num_classes: usize) -> ImageDataset {
    let shape = InputShape { channels: 1, height: 2, width: 2 };
    let images = (0..samples).map(|i| vec![i as f64 / samples as f64; 4]).collect();
    let labels = (0..samples).map(|i| i % num_classes).collect();
    let names = (0..num_classes).map(|c| format!("class{c}")).collect();
    ImageDataset::new(shape, images, labels, names).unwrap()
}
