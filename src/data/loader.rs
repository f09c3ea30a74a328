use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::dataset::ImageDataset;
use crate::error::{Error, Result};
use crate::math::tensor::Tensor;

/// One mini-batch: `images` is `[batch, c, h, w]`, `labels[i]` belongs to image `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub images: Tensor,
    pub labels: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Restartable batch sequence over a borrowed dataset.
///
/// Every call to [`DataLoader::batches`] starts a fresh pass. With shuffling
/// enabled each pass visits the samples in a new order.
pub struct DataLoader<'a> {
    dataset: &'a ImageDataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    rng: StdRng,
}

impl<'a> DataLoader<'a> {
    pub fn new(dataset: &'a ImageDataset, batch_size: usize) -> Result<DataLoader<'a>> {
        if batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        Ok(DataLoader {
            dataset,
            batch_size,
            shuffle: false,
            drop_last: false,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    pub fn dataset(&self) -> &'a ImageDataset {
        self.dataset
    }

    /// Size of the underlying dataset, including samples a dropped last
    /// batch never yields.
    pub fn dataset_len(&self) -> usize {
        self.dataset.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_batches(&self) -> usize {
        let n = self.dataset.len();
        if self.drop_last {
            n / self.batch_size
        } else {
            n.div_ceil(self.batch_size)
        }
    }

    pub fn batches(&mut self) -> Batches<'a> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }
        if self.drop_last {
            order.truncate(self.num_batches() * self.batch_size);
        }
        Batches { dataset: self.dataset, order, batch_size: self.batch_size, cursor: 0 }
    }
}

pub struct Batches<'a> {
    dataset: &'a ImageDataset,
    order: Vec<usize>,
    batch_size: usize,
    cursor: usize,
}

impl Iterator for Batches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let indices = &self.order[self.cursor..end];
        self.cursor = end;

        let shape = self.dataset.shape;
        let mut images = Tensor::zeros([indices.len(), shape.channels, shape.height, shape.width]);
        let mut labels = Vec::with_capacity(indices.len());
        for (row, &i) in images.data_mut().chunks_mut(shape.len().max(1)).zip(indices) {
            row.copy_from_slice(self.dataset.image(i));
            labels.push(self.dataset.label(i));
        }
        Some(Batch { images, labels })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.order.len() - self.cursor).div_ceil(self.batch_size);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Batches<'_> {}
