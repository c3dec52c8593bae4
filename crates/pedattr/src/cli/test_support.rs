//! A recognizer over a parameter-free backbone and a two-attribute head.

use candle_core::{DType, Device, Tensor, D};
use candle_nn::VarBuilder;
use pedattr_core::backbone::{BackboneEntry, BackboneRegistry, BoxedBackbone};
use pedattr_core::model::ParameterNaming;
use pedattr_core::{AttributeRecognizer, Config};
use std::collections::HashMap;
use std::path::Path;

/// Per-channel spatial mean, so the only weights are the head's.
fn channel_mean(_vb: VarBuilder) -> candle_core::Result<BoxedBackbone> {
    Ok(Box::new(candle_nn::func(|xs: &Tensor| {
        xs.mean(D::Minus1)?.mean(D::Minus1)
    })))
}

/// Config rooted at `dir`: `uploads/walker.png` is a red image, so `Female`
/// (red-weighted) is positive and `Hat` is not.
pub fn fixture_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.model.backbone = "channel_mean".to_string();
    config.model.device = "cpu".to_string();
    config.model.checkpoint = dir.join("ckpt.safetensors");
    config.general.upload_dir = dir.join("uploads");
    std::fs::create_dir(&config.general.upload_dir).unwrap();
    let attributes = dir.join("attributes.txt");
    std::fs::write(&attributes, "Female\nHat\n").unwrap();
    config.dataset.attributes_file = Some(attributes);

    let naming = ParameterNaming::from_config(&config.model);
    let weight = Tensor::new(&[[1f32, 0., 0.], [-1., 0., 0.]], &Device::Cpu).unwrap();
    let bias = Tensor::zeros(2, DType::F32, &Device::Cpu).unwrap();
    let tensors = HashMap::from([
        (naming.key("head.weight"), weight),
        (naming.key("head.bias"), bias),
    ]);
    candle_core::safetensors::save(&tensors, &config.model.checkpoint).unwrap();

    image::RgbImage::from_pixel(8, 16, image::Rgb([200, 40, 40]))
        .save(config.general.upload_dir.join("walker.png"))
        .unwrap();
    config
}

pub fn fixture_recognizer(dir: &Path) -> AttributeRecognizer {
    let mut registry = BackboneRegistry::empty();
    registry
        .register(BackboneEntry {
            name: "channel_mean",
            feature_width: 3,
            build: channel_mean,
        })
        .unwrap();
    AttributeRecognizer::with_registry(fixture_config(dir), registry).unwrap()
}
