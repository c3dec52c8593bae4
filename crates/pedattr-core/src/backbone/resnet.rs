//! ResNet feature extractors (bottleneck variants).
//!
//! Layout and parameter names match torchvision's `ResNet` with the final
//! fully-connected layer removed: `conv1`, `bn1`, `layer{1..4}.{i}.*`.

use candle_core::{Module, Result, Tensor};
use candle_nn::{Conv2d, VarBuilder};

use super::layers::{conv, global_avg_pool, max_pool_3x3_s2, FrozenBatchNorm};
use super::BoxedBackbone;

const BN_EPS: f64 = 1e-5;
const EXPANSION: usize = 4;

/// Output channels of every bottleneck ResNet.
pub const FEATURE_WIDTH: usize = 512 * EXPANSION;

#[derive(Debug)]
struct Downsample {
    conv: Conv2d,
    bn: FrozenBatchNorm,
}

#[derive(Debug)]
struct Bottleneck {
    conv1: Conv2d,
    bn1: FrozenBatchNorm,
    conv2: Conv2d,
    bn2: FrozenBatchNorm,
    conv3: Conv2d,
    bn3: FrozenBatchNorm,
    downsample: Option<Downsample>,
}

impl Bottleneck {
    fn new(in_channels: usize, planes: usize, stride: usize, vb: VarBuilder) -> Result<Self> {
        let out_channels = planes * EXPANSION;
        let downsample = if stride != 1 || in_channels != out_channels {
            // torchvision stores the projection as a Sequential: 0 = conv, 1 = bn
            let vb = vb.pp("downsample");
            Some(Downsample {
                conv: conv(in_channels, out_channels, 1, stride, 0, 1, vb.pp("0"))?,
                bn: FrozenBatchNorm::new(out_channels, BN_EPS, vb.pp("1"))?,
            })
        } else {
            None
        };
        Ok(Self {
            conv1: conv(in_channels, planes, 1, 1, 0, 1, vb.pp("conv1"))?,
            bn1: FrozenBatchNorm::new(planes, BN_EPS, vb.pp("bn1"))?,
            conv2: conv(planes, planes, 3, stride, 1, 1, vb.pp("conv2"))?,
            bn2: FrozenBatchNorm::new(planes, BN_EPS, vb.pp("bn2"))?,
            conv3: conv(planes, out_channels, 1, 1, 0, 1, vb.pp("conv3"))?,
            bn3: FrozenBatchNorm::new(out_channels, BN_EPS, vb.pp("bn3"))?,
            downsample,
        })
    }
}

impl Module for Bottleneck {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let identity = match &self.downsample {
            Some(ds) => ds.bn.forward(&ds.conv.forward(xs)?)?,
            None => xs.clone(),
        };
        let ys = self.bn1.forward(&self.conv1.forward(xs)?)?.relu()?;
        let ys = self.bn2.forward(&self.conv2.forward(&ys)?)?.relu()?;
        let ys = self.bn3.forward(&self.conv3.forward(&ys)?)?;
        (ys + identity)?.relu()
    }
}

/// Bottleneck ResNet trunk followed by global average pooling.
#[derive(Debug)]
pub struct ResNet {
    conv1: Conv2d,
    bn1: FrozenBatchNorm,
    stages: Vec<Vec<Bottleneck>>,
}

impl ResNet {
    /// Build a ResNet with `blocks[i]` bottlenecks in stage `i + 1`.
    pub fn new(blocks: [usize; 4], vb: VarBuilder) -> Result<Self> {
        let conv1 = conv(3, 64, 7, 2, 3, 1, vb.pp("conv1"))?;
        let bn1 = FrozenBatchNorm::new(64, BN_EPS, vb.pp("bn1"))?;

        let mut in_channels = 64;
        let mut stages = Vec::with_capacity(4);
        for (stage, &count) in blocks.iter().enumerate() {
            let planes = 64 << stage;
            let stride = if stage == 0 { 1 } else { 2 };
            let vb = vb.pp(format!("layer{}", stage + 1));
            let mut layer = Vec::with_capacity(count);
            for i in 0..count {
                let block_stride = if i == 0 { stride } else { 1 };
                layer.push(Bottleneck::new(in_channels, planes, block_stride, vb.pp(i))?);
                in_channels = planes * EXPANSION;
            }
            stages.push(layer);
        }

        Ok(Self { conv1, bn1, stages })
    }
}

impl Module for ResNet {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut ys = self.bn1.forward(&self.conv1.forward(xs)?)?.relu()?;
        ys = max_pool_3x3_s2(&ys)?;
        for layer in &self.stages {
            for block in layer {
                ys = block.forward(&ys)?;
            }
        }
        global_avg_pool(&ys)
    }
}

pub fn resnet50(vb: VarBuilder) -> Result<BoxedBackbone> {
    Ok(Box::new(ResNet::new([3, 4, 6, 3], vb)?))
}

pub fn resnet101(vb: VarBuilder) -> Result<BoxedBackbone> {
    Ok(Box::new(ResNet::new([3, 4, 23, 3], vb)?))
}

pub fn resnet152(vb: VarBuilder) -> Result<BoxedBackbone> {
    Ok(Box::new(ResNet::new([3, 8, 36, 3], vb)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_parameter_names_follow_torchvision() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let _ = ResNet::new([3, 4, 6, 3], vb).unwrap();
        let data = varmap.data().lock().unwrap();
        for name in [
            "conv1.weight",
            "bn1.running_var",
            "layer1.0.downsample.0.weight",
            "layer1.0.downsample.1.bias",
            "layer3.5.conv3.weight",
            "layer4.2.bn3.running_mean",
        ] {
            assert!(data.contains_key(name), "missing {name}");
        }
        assert!(!data.contains_key("layer1.1.downsample.0.weight"));
        assert!(!data.contains_key("fc.weight"));
        assert_eq!(data["layer2.0.conv2.weight"].dims(), &[128, 128, 3, 3]);
    }
}
