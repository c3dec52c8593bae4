//! Building blocks shared by the backbone implementations.
//!
//! Parameter names follow the PyTorch module layout so that checkpoints
//! exported from the training code load without renaming.

use candle_core::{Module, Result, Tensor, D};
use candle_nn::{
    batch_norm, conv2d_no_bias, BatchNorm, Conv2d, Conv2dConfig, ModuleT, VarBuilder,
};

/// Batch normalization that always uses its running statistics.
///
/// There is no way to switch this layer into training mode.
#[derive(Debug, Clone)]
pub struct FrozenBatchNorm(BatchNorm);

impl FrozenBatchNorm {
    pub fn new(channels: usize, eps: f64, vb: VarBuilder) -> Result<Self> {
        Ok(Self(batch_norm(channels, eps, vb)?))
    }
}

impl Module for FrozenBatchNorm {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        self.0.forward_t(xs, false)
    }
}

/// Bias-free convolution with square kernel.
pub fn conv(
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
    groups: usize,
    vb: VarBuilder,
) -> Result<Conv2d> {
    let cfg = Conv2dConfig {
        padding,
        stride,
        groups,
        ..Default::default()
    };
    conv2d_no_bias(in_channels, out_channels, kernel, cfg, vb)
}

/// 3×3 / stride 2 max pooling with one pixel of padding on every side.
///
/// Inputs are post-ReLU, so edge replication gives the same maxima as
/// PyTorch's implicit negative-infinity padding.
pub fn max_pool_3x3_s2(xs: &Tensor) -> Result<Tensor> {
    xs.pad_with_same(D::Minus1, 1, 1)?
        .pad_with_same(D::Minus2, 1, 1)?
        .max_pool2d_with_stride(3, 2)
}

/// Global average pooling: `[N, C, H, W]` → `[N, C]`.
pub fn global_avg_pool(xs: &Tensor) -> Result<Tensor> {
    xs.mean(D::Minus1)?.mean(D::Minus1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn test_global_avg_pool_shape_and_value() {
        let xs = Tensor::ones((2, 4, 3, 5), DType::F32, &Device::Cpu).unwrap();
        let pooled = global_avg_pool(&xs).unwrap();
        assert_eq!(pooled.dims(), &[2, 4]);
        let values = pooled.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(values.iter().all(|v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_max_pool_halves_resolution() {
        let xs = Tensor::zeros((1, 2, 16, 12), DType::F32, &Device::Cpu).unwrap();
        let pooled = max_pool_3x3_s2(&xs).unwrap();
        assert_eq!(pooled.dims(), &[1, 2, 8, 6]);
    }

    #[test]
    fn test_frozen_batch_norm_uses_running_stats() {
        // zeros backend: running_mean = 0, running_var = 0, weight = 0, bias = 0,
        // so every output collapses to the bias regardless of the batch.
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let bn = FrozenBatchNorm::new(3, 1e-5, vb).unwrap();
        let xs = Tensor::randn(0f32, 1f32, (2, 3, 4, 4), &Device::Cpu).unwrap();
        let out = bn.forward(&xs).unwrap();
        assert_eq!(out.dims(), &[2, 3, 4, 4]);
        let total = out.abs().unwrap().sum_all().unwrap().to_scalar::<f32>().unwrap();
        assert_eq!(total, 0.0);
    }
}
