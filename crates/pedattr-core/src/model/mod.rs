//! Backbone + head composition and checkpoint restoration.
//!
//! The composed model is inference-only: every normalization layer uses its
//! running statistics and nothing accepts a training flag.

pub mod checkpoint;
pub mod device;
pub mod head;

use candle_core::{Module, Tensor};
use candle_nn::VarBuilder;

pub use checkpoint::{CheckpointLoader, LoadedModel, ParameterNaming};
pub use head::AttributeHead;

use crate::backbone::{BackboneRegistry, BoxedBackbone};
use crate::error::Result;

/// Parameter prefix of the feature extractor.
pub const BACKBONE_PREFIX: &str = "backbone";
/// Parameter prefix of the classifier.
pub const HEAD_PREFIX: &str = "head";

/// Feature extractor followed by the attribute classifier.
pub struct AttributeModel {
    backbone: BoxedBackbone,
    head: AttributeHead,
    backbone_name: String,
    parameter_count: usize,
}

impl std::fmt::Debug for AttributeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeModel")
            .field("backbone", &self.backbone_name)
            .field("feature_width", &self.feature_width())
            .field("num_attributes", &self.num_attributes())
            .field("parameter_count", &self.parameter_count)
            .finish()
    }
}

impl AttributeModel {
    /// Build the graph. The head is sized from the registered backbone width.
    pub fn new(
        registry: &BackboneRegistry,
        backbone_name: &str,
        num_attributes: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let (backbone, width) = registry.build(backbone_name, vb.pp(BACKBONE_PREFIX))?;
        let head = AttributeHead::new(width, num_attributes, vb.pp(HEAD_PREFIX)).map_err(
            |source| crate::error::LoadError::Build {
                backbone: backbone_name.to_string(),
                source,
            },
        )?;
        Ok(Self {
            backbone,
            head,
            backbone_name: backbone_name.to_string(),
            parameter_count: 0,
        })
    }

    pub(crate) fn with_parameter_count(mut self, count: usize) -> Self {
        self.parameter_count = count;
        self
    }

    /// `[N, 3, H, W]` images → `[N, nattr]` logits.
    pub fn forward(&self, images: &Tensor) -> candle_core::Result<Tensor> {
        let features = self.backbone.forward(images)?;
        self.head.forward(&features)
    }

    pub fn backbone_name(&self) -> &str {
        &self.backbone_name
    }

    pub fn feature_width(&self) -> usize {
        self.head.input_width()
    }

    pub fn num_attributes(&self) -> usize {
        self.head.num_attributes()
    }

    /// Scalar count of restored parameters (zero when built without a checkpoint).
    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }
}
