//! Single-image scoring.
//!
//! Preprocesses one image into a batch of one, runs the composed model and
//! turns each logit into a probability with the logistic function. Names and
//! probabilities are paired by position, so the attribute list must have
//! exactly as many entries as the head has outputs.

use candle_core::{DType, Device};
use image::DynamicImage;

use crate::attributes::AttributeList;
use crate::error::{ConfigError, PipelineError, PipelineResult};
use crate::math::sigmoid_all;
use crate::model::AttributeModel;
use crate::preprocess::Preprocessor;
use crate::types::{AttributeScore, ScoreResult};

/// Scores images with a loaded model.
#[derive(Debug)]
pub struct Scorer {
    model: AttributeModel,
    attributes: AttributeList,
    preprocessor: Preprocessor,
    device: Device,
}

impl Scorer {
    /// Fails when the head size and the attribute list disagree.
    pub fn new(
        model: AttributeModel,
        attributes: AttributeList,
        preprocessor: Preprocessor,
        device: Device,
    ) -> Result<Self, ConfigError> {
        if model.num_attributes() != attributes.len() {
            return Err(ConfigError::AttributeCountMismatch {
                expected: model.num_attributes(),
                actual: attributes.len(),
            });
        }
        Ok(Self {
            model,
            attributes,
            preprocessor,
            device,
        })
    }

    pub fn model(&self) -> &AttributeModel {
        &self.model
    }

    pub fn attributes(&self) -> &AttributeList {
        &self.attributes
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Raw head outputs for one image, in attribute order.
    pub fn logits(&self, image: &DynamicImage) -> PipelineResult<Vec<f32>> {
        let input = self.preprocessor.to_input(image, &self.device)?;
        let logits = self
            .model
            .forward(&input)?
            .squeeze(0)?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()?;
        if logits.len() != self.attributes.len() {
            return Err(PipelineError::Inference {
                message: format!(
                    "model produced {} logits for {} attributes",
                    logits.len(),
                    self.attributes.len()
                ),
            });
        }
        Ok(logits)
    }

    /// Score one image. Every attribute gets an entry.
    pub fn score(&self, image: &DynamicImage) -> PipelineResult<ScoreResult> {
        let logits = self.logits(image)?;
        let probabilities = sigmoid_all(&logits);
        let entries: Vec<AttributeScore> = self
            .attributes
            .iter()
            .zip(logits.into_iter().zip(probabilities))
            .map(|(name, (logit, probability))| AttributeScore {
                name: name.to_string(),
                logit,
                probability,
            })
            .collect();

        for entry in &entries {
            tracing::debug!("{}: {:.5}", entry.name, entry.probability);
        }
        tracing::debug!(
            attributes = entries.len(),
            positive = entries.iter().filter(|e| e.is_positive()).count(),
            "Scored image"
        );
        Ok(ScoreResult::from_entries(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backbone::{BackboneEntry, BackboneRegistry, BoxedBackbone};
    use crate::config::PreprocessConfig;
    use crate::math::sigmoid;
    use candle_core::{Tensor, D};
    use candle_nn::VarBuilder;
    use image::{Rgb, RgbImage};

    /// Per-channel spatial mean: `[N, 3, H, W]` → `[N, 3]`.
    fn channel_mean(_vb: VarBuilder) -> candle_core::Result<BoxedBackbone> {
        Ok(Box::new(candle_nn::func(|xs: &Tensor| {
            xs.mean(D::Minus1)?.mean(D::Minus1)
        })))
    }

    fn registry() -> BackboneRegistry {
        let mut registry = BackboneRegistry::empty();
        registry
            .register(BackboneEntry {
                name: "channel_mean",
                feature_width: 3,
                build: channel_mean,
            })
            .unwrap();
        registry
    }

    /// head.weight = identity over 3 channels, bias = [0, 0, -100].
    fn scorer(names: &[&str]) -> Result<Scorer, ConfigError> {
        let device = Device::Cpu;
        let n = names.len();
        let mut weight = vec![0f32; n * 3];
        for i in 0..n.min(3) {
            weight[i * 3 + i] = 1.0;
        }
        let mut bias = vec![0f32; n];
        if n > 2 {
            bias[2] = -100.0;
        }
        let tensors = std::collections::HashMap::from([
            (
                "head.weight".to_string(),
                Tensor::from_vec(weight, (n, 3), &device).unwrap(),
            ),
            (
                "head.bias".to_string(),
                Tensor::from_vec(bias, n, &device).unwrap(),
            ),
        ]);
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let model = AttributeModel::new(&registry(), "channel_mean", n, vb).unwrap();
        let preprocess = PreprocessConfig {
            height: 8,
            width: 6,
            mean: [0.0; 3],
            std: [1.0; 3],
        };
        Scorer::new(
            model,
            AttributeList::new(names.iter().copied()).unwrap(),
            Preprocessor::new(&preprocess),
            device,
        )
    }

    #[test]
    fn test_scores_every_attribute_in_order() {
        let scorer = scorer(&["red", "green", "blue"]).unwrap();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 16, Rgb([255, 0, 255])));
        let result = scorer.score(&img).unwrap();

        let names: Vec<_> = result.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["red", "green", "blue"]);
        assert!(result.iter().all(|e| (0.0..=1.0).contains(&e.probability)));

        // red: logit 1.0, green: logit 0.0, blue: 1.0 - 100
        assert!((result.get("red").unwrap() - sigmoid(1.0)).abs() < 1e-6);
        assert_eq!(result.get("green"), Some(0.5));
        assert!(result.get("blue").unwrap() < 1e-30);
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let scorer = scorer(&["red", "green", "blue"]).unwrap();
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(20, 30, |x, y| {
            Rgb([(x * 10) as u8, (y * 5) as u8, 200])
        }));
        assert_eq!(scorer.score(&img).unwrap(), scorer.score(&img).unwrap());
    }

    #[test]
    fn test_attribute_count_checked_at_construction() {
        let device = Device::Cpu;
        let vb = VarBuilder::zeros(DType::F32, &device);
        let model = AttributeModel::new(&registry(), "channel_mean", 3, vb).unwrap();
        let err = Scorer::new(
            model,
            AttributeList::new(["a", "b"]).unwrap(),
            Preprocessor::new(&PreprocessConfig::default()),
            device,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::AttributeCountMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }
}
