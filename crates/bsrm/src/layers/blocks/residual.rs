//! # Residual Block
//!
//! [`ResBlock2d`] is the core trunk unit of EDSR-style networks: two
//! same-width convolutions with an activation between them, joined to
//! the input through a scaled residual connection:
//!
//! ```text
//! out = input + body(input) * res_scale
//! ```
//!
//! Deep, wide trunks train unstably with full-strength residuals;
//! `res_scale` (e.g. 0.1) damps each block's contribution.

use crate::layers::activation::ActivationConfig;
use crate::layers::blocks::conv_block::{ConvBlock2d, ConvBlock2dConfig, ConvBlock2dMeta};
use crate::layers::norm::NormalizationConfig;
use bimm_contracts::{run_every_nth, shape_contract, ShapeContract};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// [`ResBlock2d`] Meta.
pub trait ResBlock2dMeta {
    /// Feature width (input and output channels).
    fn n_feats(&self) -> usize;

    /// Residual scaling factor.
    fn res_scale(&self) -> f64;
}

/// [`ResBlock2d`] Config.
#[derive(Config, Debug)]
pub struct ResBlock2dConfig {
    /// Feature width (input and output channels).
    pub n_feats: usize,

    /// Kernel size of both convolutions.
    #[config(default = 3)]
    pub kernel_size: usize,

    /// Whether the convolutions carry a bias.
    #[config(default = true)]
    pub bias: bool,

    /// Optional norm after each convolution.
    #[config(default = "None")]
    pub norm: Option<NormalizationConfig>,

    /// Activation between the convolutions.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,

    /// Residual scaling factor.
    #[config(default = 1.0)]
    pub res_scale: f64,
}

impl ResBlock2dMeta for ResBlock2dConfig {
    fn n_feats(&self) -> usize {
        self.n_feats
    }

    fn res_scale(&self) -> f64 {
        self.res_scale
    }
}

impl ResBlock2dConfig {
    /// Initialize a [`ResBlock2d`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResBlock2d<B> {
        let conv = |act: Option<ActivationConfig>| {
            let mut config = ConvBlock2dConfig::same(self.n_feats, self.n_feats, self.kernel_size)
                .with_norm(self.norm.clone())
                .with_act(act);
            config.conv = config.conv.with_bias(self.bias);
            config
        };

        ResBlock2d {
            conv1: conv(Some(self.act.clone())).init(device),
            conv2: conv(None).init(device),
            res_scale: self.res_scale,
        }
    }
}

/// EDSR-style residual block.
///
/// Implements [`ResBlock2dMeta`].
#[derive(Module, Debug)]
pub struct ResBlock2d<B: Backend> {
    /// First conv block; carries the activation.
    pub conv1: ConvBlock2d<B>,

    /// Second conv block; no activation.
    pub conv2: ConvBlock2d<B>,

    /// Residual scaling factor.
    pub res_scale: f64,
}

impl<B: Backend> ResBlock2dMeta for ResBlock2d<B> {
    fn n_feats(&self) -> usize {
        self.conv1.in_channels()
    }

    fn res_scale(&self) -> f64 {
        self.res_scale
    }
}

impl<B: Backend> ResBlock2d<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, n_feats, height, width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, n_feats, height, width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.conv1.forward(input.clone());
        let x = self.conv2.forward(x);

        let out = input + x.mul_scalar(self.res_scale);

        run_every_nth!({
            static OUTPUT_CONTRACT: ShapeContract =
                shape_contract!["batch", "n_feats", "height", "width"];
            OUTPUT_CONTRACT.assert_shape(
                &out,
                &[("n_feats", self.n_feats())],
            );
        });

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;

    #[test]
    fn test_res_block_config() {
        let config = ResBlock2dConfig::new(16);
        assert_eq!(config.n_feats(), 16);
        assert_eq!(config.res_scale(), 1.0);
        assert_eq!(config.kernel_size, 3);
        assert!(config.bias);
        assert!(config.norm.is_none());

        let config = config.with_res_scale(0.1);
        assert_eq!(config.res_scale(), 0.1);
    }

    #[test]
    fn test_forward_shape_autodiff() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let block: ResBlock2d<B> = ResBlock2dConfig::new(8).with_res_scale(0.1).init(&device);
        assert_eq!(block.n_feats(), 8);

        let input = Tensor::random([2, 8, 6, 6], Distribution::Default, &device);
        let output = block.forward(input.clone());
        assert_eq!(output.dims(), input.dims());
    }

    #[test]
    fn test_zero_res_scale_is_identity() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: ResBlock2d<B> = ResBlock2dConfig::new(4).with_res_scale(0.0).init(&device);

        let input = Tensor::random([1, 4, 5, 5], Distribution::Default, &device);
        let output = block.forward(input.clone());

        output.to_data().assert_eq(&input.to_data(), true);
    }
}
