//! In-memory image datasets and mini-batch iteration.

pub mod dataset;
pub mod image_folder;
pub mod loader;

pub use dataset::ImageDataset;
pub use image_folder::load_image_folder;
pub use loader::{Batch, Batches, DataLoader};
