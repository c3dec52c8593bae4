//! Linear classifier mapping pooled features to attribute logits.

use candle_core::{Module, Result, Tensor};
use candle_nn::{linear, Linear, VarBuilder};

/// One fully-connected layer, `netpara → nattr`. No activation.
#[derive(Debug, Clone)]
pub struct AttributeHead {
    linear: Linear,
    input_width: usize,
    num_attributes: usize,
}

impl AttributeHead {
    pub fn new(input_width: usize, num_attributes: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            linear: linear(input_width, num_attributes, vb)?,
            input_width,
            num_attributes,
        })
    }

    pub fn input_width(&self) -> usize {
        self.input_width
    }

    pub fn num_attributes(&self) -> usize {
        self.num_attributes
    }
}

impl Module for AttributeHead {
    fn forward(&self, features: &Tensor) -> Result<Tensor> {
        self.linear.forward(features)
    }
}
