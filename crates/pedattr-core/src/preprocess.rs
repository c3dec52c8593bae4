//! Image → normalized input tensor.
//!
//! The transform must match what the checkpoint was trained with:
//! - Input size: `height × width` (default 256×192), bilinear resize
//! - Normalization: `(pixel/255 - mean[c]) / std[c]` with ImageNet statistics
//! - Channel order: RGB
//! - Tensor layout: NCHW [1, 3, height, width]

use candle_core::{Device, Tensor};
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;

use crate::config::PreprocessConfig;

/// Number of color channels (RGB).
const CHANNELS: usize = 3;

/// Deterministic resize + normalize transform.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    height: u32,
    width: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl Preprocessor {
    pub fn new(config: &PreprocessConfig) -> Self {
        Self {
            height: config.height,
            width: config.width,
            mean: config.mean,
            std: config.std,
        }
    }

    /// `(height, width)` of the produced tensor.
    pub fn size(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    /// Resize, convert to RGB and normalize into a single-item NCHW batch.
    pub fn transform(&self, image: &DynamicImage) -> Array4<f32> {
        let rgb = image
            .resize_exact(self.width, self.height, FilterType::Triangle)
            .to_rgb8();

        let (h, w) = (self.height as usize, self.width as usize);
        Array4::from_shape_fn((1, CHANNELS, h, w), |(_, c, y, x)| {
            let val = rgb.get_pixel(x as u32, y as u32)[c];
            (val as f32 / 255.0 - self.mean[c]) / self.std[c]
        })
    }

    /// Transform straight into a tensor on `device`.
    pub fn to_input(&self, image: &DynamicImage, device: &Device) -> candle_core::Result<Tensor> {
        to_tensor(&self.transform(image), device)
    }
}

/// Move an NCHW array into a candle tensor.
pub fn to_tensor(array: &Array4<f32>, device: &Device) -> candle_core::Result<Tensor> {
    let (n, c, h, w) = array.dim();
    match array.as_slice() {
        Some(slice) => Tensor::from_slice(slice, (n, c, h, w), device),
        None => Tensor::from_iter(array.iter().copied(), device)?.reshape((n, c, h, w)),
    }
}
