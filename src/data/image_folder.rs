use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tracing::{debug, info};

use crate::data::dataset::ImageDataset;
use crate::error::{Error, Result};
use crate::model::metadata::InputShape;

/// Loads a directory laid out as `root/<class name>/<image file>`.
///
/// Class directories are sorted by name and numbered from 0. Every image is
/// resized to exactly `height × width` and converted to grayscale
/// (`channels == 1`) or RGB (`channels == 3`). Files that are not a known
/// image format are skipped.
pub fn load_image_folder(root: impl AsRef<Path>, channels: usize, height: usize, width: usize) -> Result<ImageDataset> {
    let root = root.as_ref();
    if channels != 1 && channels != 3 {
        return Err(Error::Dataset(format!("unsupported channel count {channels}, expected 1 or 3")));
    }
    let shape = InputShape { channels, height, width };

    let class_dirs = sorted_entries(root, |p| p.is_dir())?;
    if class_dirs.is_empty() {
        return Err(Error::Dataset(format!("no class directories under {}", root.display())));
    }

    let mut class_names = Vec::with_capacity(class_dirs.len());
    let mut images = Vec::new();
    let mut labels = Vec::new();

    for (label, dir) in class_dirs.iter().enumerate() {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut count = 0;
        for file in sorted_entries(dir, |p| p.is_file())? {
            if ImageFormat::from_path(&file).is_err() {
                debug!(path = %file.display(), "skipping non-image file");
                continue;
            }
            let img = image::open(&file)?;
            images.push(to_planar(&img, shape));
            labels.push(label);
            count += 1;
        }
        debug!(class = %name, label, count, "loaded class");
        class_names.push(name);
    }

    info!(root = %root.display(), samples = labels.len(), classes = class_names.len(), "loaded image folder");
    ImageDataset::new(shape, images, labels, class_names)
}

fn sorted_entries(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with('.'))
            .unwrap_or(true);
        if !hidden && keep(&path) {
            entries.push(path);
        }
    }
    entries.sort();
    Ok(entries)
}

/// Resizes and normalises to `[0, 1]`, laid out channel-major.
fn to_planar(img: &DynamicImage, shape: InputShape) -> Vec<f64> {
    let resized = img.resize_exact(shape.width as u32, shape.height as u32, FilterType::Lanczos3);
    let plane = shape.height * shape.width;
    let mut out = vec![0.0; shape.len()];
    if shape.channels == 1 {
        for (i, p) in resized.to_luma8().pixels().enumerate() {
            out[i] = p.0[0] as f64 / 255.0;
        }
    } else {
        for (i, p) in resized.to_rgb8().pixels().enumerate() {
            for c in 0..3 {
                out[c * plane + i] = p.0[c] as f64 / 255.0;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_png(dir: &Path, name: &str, color: [u8; 3]) {
        fs::create_dir_all(dir).unwrap();
        RgbImage::from_pixel(6, 6, Rgb(color)).save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_loads_sorted_classes_planar() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(&tmp.path().join("happy"), "a.png", [0, 255, 0]);
        write_png(&tmp.path().join("angry"), "b.png", [255, 0, 0]);
        write_png(&tmp.path().join("angry"), "c.png", [255, 0, 0]);
        fs::write(tmp.path().join("angry").join("notes.txt"), "x").unwrap();

        let ds = load_image_folder(tmp.path(), 3, 2, 2).unwrap();
        assert_eq!(ds.class_names(), &["angry".to_string(), "happy".to_string()]);
        assert_eq!(ds.labels(), &[0, 0, 1]);

        let red = ds.image(0);
        assert_eq!(red.len(), 12);
        assert!(red[..4].iter().all(|&v| (v - 1.0).abs() < 1e-2));
        assert!(red[4..].iter().all(|&v| v.abs() < 1e-2));
        let green = ds.image(2);
        assert!(green[4..8].iter().all(|&v| (v - 1.0).abs() < 1e-2));
    }

    #[test]
    fn test_grayscale_and_errors() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(&tmp.path().join("only"), "a.png", [255, 255, 255]);
        let ds = load_image_folder(tmp.path(), 1, 3, 3).unwrap();
        assert_eq!(ds.image(0).len(), 9);
        assert!(ds.image(0).iter().all(|&v| (v - 1.0).abs() < 1e-2));

        assert!(matches!(load_image_folder(tmp.path(), 2, 3, 3), Err(Error::Dataset(_))));
        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(load_image_folder(empty.path(), 3, 3, 3), Err(Error::Dataset(_))));
    }
}
