use crate::error::{Error, Result};
use crate::layers::Mode;
use crate::math::{matrix::Matrix, tensor::Tensor};
use crate::model::Model;

/// Ensemble inference: runs every model on the same batch in eval mode and
/// returns the element-wise mean of their scores.
///
/// A single model yields its own raw scores. Each model's mode is restored
/// afterwards, so the call leaves no trace on the models.
pub fn predict(models: &mut [Box<dyn Model>], images: &Tensor) -> Result<Matrix> {
    let num_classes = match models.first() {
        Some(m) => m.num_classes(),
        None => return Err(Error::EmptyEnsemble),
    };
    if let Some(m) = models.iter().find(|m| m.num_classes() != num_classes) {
        return Err(Error::ClassCountMismatch { expected: num_classes, found: m.num_classes() });
    }

    let mut sum = Matrix::zeros(images.batch_size(), num_classes);
    for model in models.iter_mut() {
        let previous = model.mode();
        model.set_mode(Mode::Eval);
        let scores = model.forward(images);
        model.set_mode(previous);
        sum = sum + scores?;
    }

    if models.len() == 1 {
        return Ok(sum);
    }
    let scale = 1.0 / models.len() as f64;
    Ok(sum.map(|x| x * scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::resnet::ResNetConfig;
    use crate::model::spec::ModelSpec;
    use crate::model::small_cnn::SmallCnnConfig;

    fn spec(num_classes: usize) -> ModelSpec {
        ModelSpec::ResNet18(ResNetConfig { channels: 1, num_classes, base_width: 2, blocks: [1, 1, 1, 1] })
    }

    fn images() -> Tensor {
        Tensor::from_vec([2, 1, 16, 16], (0..512).map(|v| ((v * 7) % 13) as f64 / 13.0).collect()).unwrap()
    }

    #[test]
    fn test_single_model_returns_raw_scores() {
        let mut models = vec![spec(3).build().unwrap()];
        models[0].set_mode(Mode::Eval);
        let direct = models[0].forward(&images()).unwrap();
        models[0].set_mode(Mode::Train);

        let ensembled = predict(&mut models, &images()).unwrap();
        assert_eq!(ensembled, direct);
        assert_eq!(models[0].mode(), Mode::Train);
    }

    #[test]
    fn test_mean_of_two_models() {
        let mut a = vec![spec(3).build().unwrap()];
        let mut b = vec![spec(3).build().unwrap()];
        let sa = predict(&mut a, &images()).unwrap();
        let sb = predict(&mut b, &images()).unwrap();

        let mut both = vec![a.remove(0), b.remove(0)];
        let mean = predict(&mut both, &images()).unwrap();
        for i in 0..2 {
            for j in 0..3 {
                approx::assert_abs_diff_eq!(mean.data[i][j], (sa.data[i][j] + sb.data[i][j]) / 2.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_rejects_empty_and_mismatched() {
        let mut none: Vec<Box<dyn Model>> = Vec::new();
        assert!(matches!(predict(&mut none, &images()), Err(Error::EmptyEnsemble)));

        let small = ModelSpec::SmallCnn(SmallCnnConfig {
            channels: 1,
            height: 16,
            width: 16,
            num_classes: 4,
            conv_channels: [2, 2, 2],
            hidden: [4, 4],
            ..SmallCnnConfig::default()
        });
        let mut mixed = vec![spec(3).build().unwrap(), small.build().unwrap()];
        assert!(matches!(
            predict(&mut mixed, &images()),
            Err(Error::ClassCountMismatch { expected: 3, found: 4 })
        ));
    }
}
