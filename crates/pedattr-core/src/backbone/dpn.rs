//! Dual Path Network feature extractors.
//!
//! Each block carries two streams: a residual stream that is summed and a
//! densely connected stream that grows by `inc` channels per block. Parameter
//! names follow the reference `DPN.features` layout (`conv1_1`, `conv2_1`, ...,
//! `conv5_bn_ac`) without the `last_linear` classifier.

use candle_core::{Module, Result, Tensor};
use candle_nn::{Conv2d, VarBuilder};

use super::layers::{conv, global_avg_pool, max_pool_3x3_s2, FrozenBatchNorm};
use super::BoxedBackbone;

const BN_EPS: f64 = 1e-3;

/// Architecture hyper-parameters for one DPN variant.
#[derive(Debug, Clone, Copy)]
pub struct DpnConfig {
    /// 3×3 stem and narrower stages (DPN-68 family).
    pub small: bool,
    pub num_init_features: usize,
    pub k_r: usize,
    pub groups: usize,
    /// Separate residual/dense output projections ("b" variants).
    pub b: bool,
    pub k_sec: [usize; 4],
    pub inc_sec: [usize; 4],
}

impl DpnConfig {
    pub const DPN68: Self = Self {
        small: true,
        num_init_features: 10,
        k_r: 128,
        groups: 32,
        b: false,
        k_sec: [3, 4, 12, 3],
        inc_sec: [16, 32, 32, 64],
    };

    pub const DPN68B: Self = Self {
        b: true,
        ..Self::DPN68
    };

    pub const DPN92: Self = Self {
        small: false,
        num_init_features: 64,
        k_r: 96,
        groups: 32,
        b: false,
        k_sec: [3, 4, 20, 3],
        inc_sec: [16, 32, 24, 128],
    };

    pub const DPN98: Self = Self {
        small: false,
        num_init_features: 96,
        k_r: 160,
        groups: 40,
        b: false,
        k_sec: [3, 6, 20, 3],
        inc_sec: [16, 32, 32, 128],
    };

    pub const DPN131: Self = Self {
        small: false,
        num_init_features: 128,
        k_r: 160,
        groups: 40,
        b: false,
        k_sec: [4, 8, 28, 3],
        inc_sec: [16, 32, 32, 128],
    };

    pub const DPN107: Self = Self {
        small: false,
        num_init_features: 128,
        k_r: 200,
        groups: 50,
        b: false,
        k_sec: [4, 8, 20, 3],
        inc_sec: [20, 64, 64, 128],
    };

    fn bw_factor(&self) -> usize {
        if self.small {
            1
        } else {
            4
        }
    }

    /// Channels leaving the final stage.
    pub fn feature_width(&self) -> usize {
        let bw = 512 * self.bw_factor();
        let inc = self.inc_sec[3];
        bw + 3 * inc + (self.k_sec[3] - 1) * inc
    }
}

/// BN → ReLU → conv.
#[derive(Debug)]
struct BnActConv {
    bn: FrozenBatchNorm,
    conv: Conv2d,
}

impl BnActConv {
    #[allow(clippy::too_many_arguments)]
    fn new(
        in_chs: usize,
        out_chs: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        groups: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        Ok(Self {
            bn: FrozenBatchNorm::new(in_chs, BN_EPS, vb.pp("bn"))?,
            conv: conv(in_chs, out_chs, kernel, stride, padding, groups, vb.pp("conv"))?,
        })
    }
}

impl Module for BnActConv {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        self.conv.forward(&self.bn.forward(xs)?.relu()?)
    }
}

/// BN → ReLU over the concatenated streams.
#[derive(Debug)]
struct CatBnAct {
    bn: FrozenBatchNorm,
}

impl CatBnAct {
    fn new(in_chs: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            bn: FrozenBatchNorm::new(in_chs, BN_EPS, vb.pp("bn"))?,
        })
    }
}

impl Module for CatBnAct {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        self.bn.forward(xs)?.relu()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockType {
    /// First block of stage 2: projection at stride 1.
    Proj,
    /// First block of stages 3..5: projection at stride 2.
    Down,
    Normal,
}

#[derive(Debug)]
enum OutputProjection {
    /// One conv whose output is split into residual and dense parts.
    Joint(BnActConv),
    /// Shared BN/ReLU followed by separate residual and dense convs.
    Split {
        bn_act: CatBnAct,
        residual: Conv2d,
        dense: Conv2d,
    },
}

#[derive(Debug)]
struct DualPathBlock {
    num_1x1_c: usize,
    projection: Option<BnActConv>,
    c1x1_a: BnActConv,
    c3x3_b: BnActConv,
    output: OutputProjection,
}

/// Residual and dense streams between blocks.
struct Streams {
    residual: Tensor,
    dense: Tensor,
}

impl Streams {
    fn concat(&self) -> Result<Tensor> {
        Tensor::cat(&[&self.residual, &self.dense], 1)
    }
}

impl DualPathBlock {
    #[allow(clippy::too_many_arguments)]
    fn new(
        in_chs: usize,
        num_1x1_a: usize,
        num_3x3_b: usize,
        num_1x1_c: usize,
        inc: usize,
        groups: usize,
        block_type: BlockType,
        b: bool,
        vb: VarBuilder,
    ) -> Result<Self> {
        let key_stride = if block_type == BlockType::Down { 2 } else { 1 };
        let projection = match block_type {
            BlockType::Proj => Some(BnActConv::new(
                in_chs,
                num_1x1_c + 2 * inc,
                1,
                1,
                0,
                1,
                vb.pp("c1x1_w_s1"),
            )?),
            BlockType::Down => Some(BnActConv::new(
                in_chs,
                num_1x1_c + 2 * inc,
                1,
                2,
                0,
                1,
                vb.pp("c1x1_w_s2"),
            )?),
            BlockType::Normal => None,
        };
        let c1x1_a = BnActConv::new(in_chs, num_1x1_a, 1, 1, 0, 1, vb.pp("c1x1_a"))?;
        let c3x3_b = BnActConv::new(
            num_1x1_a,
            num_3x3_b,
            3,
            key_stride,
            1,
            groups,
            vb.pp("c3x3_b"),
        )?;
        let output = if b {
            OutputProjection::Split {
                bn_act: CatBnAct::new(num_3x3_b, vb.pp("c1x1_c"))?,
                residual: conv(num_3x3_b, num_1x1_c, 1, 1, 0, 1, vb.pp("c1x1_c1"))?,
                dense: conv(num_3x3_b, inc, 1, 1, 0, 1, vb.pp("c1x1_c2"))?,
            }
        } else {
            OutputProjection::Joint(BnActConv::new(
                num_3x3_b,
                num_1x1_c + inc,
                1,
                1,
                0,
                1,
                vb.pp("c1x1_c"),
            )?)
        };
        Ok(Self {
            num_1x1_c,
            projection,
            c1x1_a,
            c3x3_b,
            output,
        })
    }

    fn forward(&self, input: &Tensor, streams: Option<&Streams>) -> Result<Streams> {
        let (shortcut_residual, shortcut_dense) = match (&self.projection, streams) {
            (Some(proj), _) => {
                let xs = proj.forward(input)?;
                let channels = xs.dim(1)?;
                (
                    xs.narrow(1, 0, self.num_1x1_c)?,
                    xs.narrow(1, self.num_1x1_c, channels - self.num_1x1_c)?,
                )
            }
            (None, Some(s)) => (s.residual.clone(), s.dense.clone()),
            (None, None) => candle_core::bail!("dual path block without projection needs streams"),
        };

        let xs = self.c1x1_a.forward(input)?;
        let xs = self.c3x3_b.forward(&xs)?;
        let (out_residual, out_dense) = match &self.output {
            OutputProjection::Joint(c1x1_c) => {
                let xs = c1x1_c.forward(&xs)?;
                let channels = xs.dim(1)?;
                (
                    xs.narrow(1, 0, self.num_1x1_c)?,
                    xs.narrow(1, self.num_1x1_c, channels - self.num_1x1_c)?,
                )
            }
            OutputProjection::Split {
                bn_act,
                residual,
                dense,
            } => {
                let xs = bn_act.forward(&xs)?;
                (residual.forward(&xs)?, dense.forward(&xs)?)
            }
        };

        Ok(Streams {
            residual: (shortcut_residual + out_residual)?,
            dense: Tensor::cat(&[&shortcut_dense, &out_dense], 1)?,
        })
    }
}

/// Stem: conv → BN → ReLU → max pool.
#[derive(Debug)]
struct InputBlock {
    conv: Conv2d,
    bn: FrozenBatchNorm,
}

impl Module for InputBlock {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let ys = self.bn.forward(&self.conv.forward(xs)?)?.relu()?;
        max_pool_3x3_s2(&ys)
    }
}

/// DPN trunk followed by global average pooling.
#[derive(Debug)]
pub struct Dpn {
    stem: InputBlock,
    blocks: Vec<DualPathBlock>,
    final_bn_act: CatBnAct,
}

impl Dpn {
    pub fn new(cfg: DpnConfig, vb: VarBuilder) -> Result<Self> {
        let vb = vb.pp("features");
        let (kernel, padding) = if cfg.small { (3, 1) } else { (7, 3) };
        let stem_vb = vb.pp("conv1_1");
        let stem = InputBlock {
            conv: conv(
                3,
                cfg.num_init_features,
                kernel,
                2,
                padding,
                1,
                stem_vb.pp("conv"),
            )?,
            bn: FrozenBatchNorm::new(cfg.num_init_features, BN_EPS, stem_vb.pp("bn"))?,
        };

        let bw_factor = cfg.bw_factor();
        let mut blocks = Vec::new();
        let mut in_chs = cfg.num_init_features;
        for stage in 0..4 {
            let bw = (64 << stage) * bw_factor;
            let inc = cfg.inc_sec[stage];
            let r = (cfg.k_r * bw) / (64 * bw_factor);
            let first = if stage == 0 {
                BlockType::Proj
            } else {
                BlockType::Down
            };
            for i in 1..=cfg.k_sec[stage] {
                let block_type = if i == 1 { first } else { BlockType::Normal };
                let name = format!("conv{}_{}", stage + 2, i);
                blocks.push(DualPathBlock::new(
                    in_chs,
                    r,
                    r,
                    bw,
                    inc,
                    cfg.groups,
                    block_type,
                    cfg.b,
                    vb.pp(name),
                )?);
                in_chs = if i == 1 { bw + 3 * inc } else { in_chs + inc };
            }
        }
        let final_bn_act = CatBnAct::new(in_chs, vb.pp("conv5_bn_ac"))?;

        Ok(Self {
            stem,
            blocks,
            final_bn_act,
        })
    }
}

impl Module for Dpn {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut input = self.stem.forward(xs)?;
        let mut streams: Option<Streams> = None;
        for block in &self.blocks {
            let next = block.forward(&input, streams.as_ref())?;
            input = next.concat()?;
            streams = Some(next);
        }
        let ys = self.final_bn_act.forward(&input)?;
        global_avg_pool(&ys)
    }
}

pub fn dpn68(vb: VarBuilder) -> Result<BoxedBackbone> {
    Ok(Box::new(Dpn::new(DpnConfig::DPN68, vb)?))
}

pub fn dpn68b(vb: VarBuilder) -> Result<BoxedBackbone> {
    Ok(Box::new(Dpn::new(DpnConfig::DPN68B, vb)?))
}

pub fn dpn92(vb: VarBuilder) -> Result<BoxedBackbone> {
    Ok(Box::new(Dpn::new(DpnConfig::DPN92, vb)?))
}

pub fn dpn98(vb: VarBuilder) -> Result<BoxedBackbone> {
    Ok(Box::new(Dpn::new(DpnConfig::DPN98, vb)?))
}

pub fn dpn131(vb: VarBuilder) -> Result<BoxedBackbone> {
    Ok(Box::new(Dpn::new(DpnConfig::DPN131, vb)?))
}

pub fn dpn107(vb: VarBuilder) -> Result<BoxedBackbone> {
    Ok(Box::new(Dpn::new(DpnConfig::DPN107, vb)?))
}
