#![allow(dead_code)]

use ferclass::model::{InputShape, ModelSpec, ResNetConfig, SmallCnnConfig};
use ferclass::{ActivationFunction, ImageDataset};

pub fn tiny_small_cnn(num_classes: usize) -> ModelSpec {
    ModelSpec::SmallCnn(SmallCnnConfig {
        channels: 1,
        height: 12,
        width: 12,
        num_classes,
        conv_channels: [2, 3, 4],
        hidden: [8, 6],
        activation: ActivationFunction::ReLU,
    })
}

pub fn tiny_resnet(num_classes: usize) -> ModelSpec {
    ModelSpec::ResNet18(ResNetConfig { channels: 1, num_classes, base_width: 2, blocks: [1, 1, 1, 1] })
}

/// Class `c` lights up horizontal band `c` of a 12x12 grayscale image.
pub fn banded_dataset(per_class: usize, num_classes: usize) -> ImageDataset {
    let shape = InputShape { channels: 1, height: 12, width: 12 };
    let band = 12 / num_classes;
    let mut images = Vec::new();
    let mut labels = Vec::new();
    for i in 0..per_class {
        for class in 0..num_classes {
            let mut img = vec![0.05 * (i % 3) as f64; shape.len()];
            for row in class * band..(class + 1) * band {
                for col in 0..12 {
                    img[row * 12 + col] = 1.0;
                }
            }
            images.push(img);
            labels.push(class);
        }
    }
    let names = (0..num_classes).map(|c| format!("class{c}")).collect();
    ImageDataset::new(shape, images, labels, names).unwrap()
}
