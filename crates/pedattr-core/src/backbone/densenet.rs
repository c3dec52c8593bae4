//! DenseNet-121 feature extractor.
//!
//! Parameter names match torchvision's `densenet121().features`:
//! `conv0`, `norm0`, `denseblock{1..4}.denselayer{j}`, `transition{1..3}`, `norm5`.

use candle_core::{Module, Result, Tensor};
use candle_nn::{Conv2d, VarBuilder};

use super::layers::{conv, global_avg_pool, max_pool_3x3_s2, FrozenBatchNorm};
use super::BoxedBackbone;

const BN_EPS: f64 = 1e-5;

/// Hyper-parameters of a DenseNet variant.
#[derive(Debug, Clone, Copy)]
pub struct DenseNetConfig {
    pub growth_rate: usize,
    pub block_config: [usize; 4],
    pub num_init_features: usize,
    pub bn_size: usize,
}

impl DenseNetConfig {
    pub const DENSENET121: Self = Self {
        growth_rate: 32,
        block_config: [6, 12, 24, 16],
        num_init_features: 64,
        bn_size: 4,
    };

    /// Channels leaving `norm5`.
    pub fn feature_width(&self) -> usize {
        let mut channels = self.num_init_features;
        for (i, &layers) in self.block_config.iter().enumerate() {
            channels += layers * self.growth_rate;
            if i + 1 < self.block_config.len() {
                channels /= 2;
            }
        }
        channels
    }
}

#[derive(Debug)]
struct DenseLayer {
    norm1: FrozenBatchNorm,
    conv1: Conv2d,
    norm2: FrozenBatchNorm,
    conv2: Conv2d,
}

impl DenseLayer {
    fn new(in_channels: usize, cfg: &DenseNetConfig, vb: VarBuilder) -> Result<Self> {
        let bottleneck = cfg.bn_size * cfg.growth_rate;
        Ok(Self {
            norm1: FrozenBatchNorm::new(in_channels, BN_EPS, vb.pp("norm1"))?,
            conv1: conv(in_channels, bottleneck, 1, 1, 0, 1, vb.pp("conv1"))?,
            norm2: FrozenBatchNorm::new(bottleneck, BN_EPS, vb.pp("norm2"))?,
            conv2: conv(bottleneck, cfg.growth_rate, 3, 1, 1, 1, vb.pp("conv2"))?,
        })
    }
}

impl Module for DenseLayer {
    /// Returns only the `growth_rate` new channels.
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let ys = self.conv1.forward(&self.norm1.forward(xs)?.relu()?)?;
        self.conv2.forward(&self.norm2.forward(&ys)?.relu()?)
    }
}

#[derive(Debug)]
struct Transition {
    norm: FrozenBatchNorm,
    conv: Conv2d,
}

impl Module for Transition {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let ys = self.conv.forward(&self.norm.forward(xs)?.relu()?)?;
        ys.avg_pool2d(2)
    }
}

#[derive(Debug)]
struct DenseStage {
    layers: Vec<DenseLayer>,
    transition: Option<Transition>,
}

/// DenseNet trunk followed by ReLU and global average pooling.
#[derive(Debug)]
pub struct DenseNet {
    conv0: Conv2d,
    norm0: FrozenBatchNorm,
    stages: Vec<DenseStage>,
    norm5: FrozenBatchNorm,
}

impl DenseNet {
    pub fn new(cfg: DenseNetConfig, vb: VarBuilder) -> Result<Self> {
        let vb = vb.pp("features");
        let conv0 = conv(3, cfg.num_init_features, 7, 2, 3, 1, vb.pp("conv0"))?;
        let norm0 = FrozenBatchNorm::new(cfg.num_init_features, BN_EPS, vb.pp("norm0"))?;

        let mut channels = cfg.num_init_features;
        let mut stages = Vec::with_capacity(cfg.block_config.len());
        for (i, &num_layers) in cfg.block_config.iter().enumerate() {
            let block_vb = vb.pp(format!("denseblock{}", i + 1));
            let mut layers = Vec::with_capacity(num_layers);
            for j in 0..num_layers {
                layers.push(DenseLayer::new(
                    channels,
                    &cfg,
                    block_vb.pp(format!("denselayer{}", j + 1)),
                )?);
                channels += cfg.growth_rate;
            }
            let transition = if i + 1 < cfg.block_config.len() {
                let t_vb = vb.pp(format!("transition{}", i + 1));
                let t = Transition {
                    norm: FrozenBatchNorm::new(channels, BN_EPS, t_vb.pp("norm"))?,
                    conv: conv(channels, channels / 2, 1, 1, 0, 1, t_vb.pp("conv"))?,
                };
                channels /= 2;
                Some(t)
            } else {
                None
            };
            stages.push(DenseStage { layers, transition });
        }
        let norm5 = FrozenBatchNorm::new(channels, BN_EPS, vb.pp("norm5"))?;

        Ok(Self {
            conv0,
            norm0,
            stages,
            norm5,
        })
    }
}

impl Module for DenseNet {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let ys = self.norm0.forward(&self.conv0.forward(xs)?)?.relu()?;
        let mut ys = max_pool_3x3_s2(&ys)?;
        for stage in &self.stages {
            for layer in &stage.layers {
                let new_features = layer.forward(&ys)?;
                ys = Tensor::cat(&[&ys, &new_features], 1)?;
            }
            if let Some(transition) = &stage.transition {
                ys = transition.forward(&ys)?;
            }
        }
        let ys = self.norm5.forward(&ys)?.relu()?;
        global_avg_pool(&ys)
    }
}

pub fn densenet121(vb: VarBuilder) -> Result<BoxedBackbone> {
    Ok(Box::new(DenseNet::new(DenseNetConfig::DENSENET121, vb)?))
}
