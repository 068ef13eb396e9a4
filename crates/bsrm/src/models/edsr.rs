//! # EDSR - Enhanced Deep Super-Resolution
//!
//! A residual trunk without normalization (Lim et al., 2017):
//!
//! ```text
//! input -> mean-shift(sub) -> head conv
//!       -> N x ResBlock2d -> closing conv -> (+ head output)
//!       -> Upsample2d -> tail conv -> mean-shift(add) -> output
//! ```
//!
//! The global residual around the body lets the trunk learn only the
//! detail the upsampler needs.

use crate::layers::blocks::conv_block::{ConvBlock2d, ConvBlock2dConfig};
use crate::layers::blocks::residual::{ResBlock2d, ResBlock2dConfig};
use crate::layers::color::{MeanShift, MeanShiftConfig, MeanShiftDirection};
use crate::layers::upsample::{Upsample2d, Upsample2dConfig};
use bimm_contracts::assert_shape_contract_periodically;
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// [`Edsr`] Config.
#[derive(Config, Debug)]
pub struct EdsrConfig {
    /// Spatial upscale factor; a power of two, or 3.
    #[config(default = 2)]
    pub scale: usize,

    /// Number of residual blocks in the trunk.
    #[config(default = 16)]
    pub n_resblocks: usize,

    /// Feature width of the trunk.
    #[config(default = 64)]
    pub n_feats: usize,

    /// Kernel size of the trunk convolutions.
    #[config(default = 3)]
    pub kernel_size: usize,

    /// Residual scaling inside each block.
    #[config(default = 1.0)]
    pub res_scale: f64,

    /// Color statistics for the mean-shift wrappers.
    #[config(default = "MeanShiftConfig::new()")]
    pub color: MeanShiftConfig,
}

impl EdsrConfig {
    /// The baseline variant: 16 blocks, 64 features, unit residual
    /// scale.
    pub fn baseline(scale: usize) -> Self {
        Self::new().with_scale(scale)
    }

    /// The large variant: 32 blocks, 256 features, damped residuals.
    pub fn large(scale: usize) -> Self {
        Self::new()
            .with_scale(scale)
            .with_n_resblocks(32)
            .with_n_feats(256)
            .with_res_scale(0.1)
    }

    /// Initialize an [`Edsr`] model.
    ///
    /// # Panics
    ///
    /// If the scale is not a power of two or 3.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Edsr<B> {
        let body = (0..self.n_resblocks)
            .map(|_| {
                ResBlock2dConfig::new(self.n_feats)
                    .with_kernel_size(self.kernel_size)
                    .with_res_scale(self.res_scale)
                    .init(device)
            })
            .collect();

        Edsr {
            sub_mean: self
                .color
                .clone()
                .with_direction(MeanShiftDirection::Sub)
                .init(device),
            head: ConvBlock2dConfig::same(3, self.n_feats, self.kernel_size).init(device),
            body,
            body_conv: ConvBlock2dConfig::same(self.n_feats, self.n_feats, self.kernel_size)
                .init(device),
            upsample: Upsample2dConfig::new(self.scale, self.n_feats)
                .with_kernel_size(self.kernel_size)
                .init(device),
            tail_conv: ConvBlock2dConfig::same(self.n_feats, 3, self.kernel_size).init(device),
            add_mean: self
                .color
                .clone()
                .with_direction(MeanShiftDirection::Add)
                .init(device),
        }
    }
}

/// EDSR super-resolution model.
#[derive(Module, Debug)]
pub struct Edsr<B: Backend> {
    /// Input mean shift.
    pub sub_mean: MeanShift<B>,

    /// Head conv, 3 channels to `n_feats`.
    pub head: ConvBlock2d<B>,

    /// Residual trunk.
    pub body: Vec<ResBlock2d<B>>,

    /// Closing trunk conv, inside the global residual.
    pub body_conv: ConvBlock2d<B>,

    /// Learned upsampler.
    pub upsample: Upsample2d<B>,

    /// Tail conv, `n_feats` back to 3 channels.
    pub tail_conv: ConvBlock2d<B>,

    /// Output mean shift.
    pub add_mean: MeanShift<B>,
}

impl<B: Backend> Edsr<B> {
    /// The spatial upscale factor.
    pub fn scale(&self) -> usize {
        self.upsample.scale()
    }

    /// Get the output resolution for a given input resolution.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.upsample.output_resolution(input_resolution)
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, 3, height, width]`` low-resolution batch.
    ///
    /// # Returns
    ///
    /// A ``[batch, 3, scale * height, scale * width]`` reconstruction.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, _, height, width] = input.dims();

        let x = self.sub_mean.forward(input);
        let x = self.head.forward(x);

        let mut res = x.clone();
        for block in &self.body {
            res = block.forward(res);
        }
        let res = self.body_conv.forward(res) + x;

        let x = self.upsample.forward(res);
        let x = self.tail_conv.forward(x);
        let out = self.add_mean.forward(x);

        let scale = self.scale();
        assert_shape_contract_periodically!(
            ["batch", "channels", "out_height", "out_width"],
            &out,
            &[
                ("batch", batch),
                ("channels", 3),
                ("out_height", height * scale),
                ("out_width", width * scale)
            ],
        );

        out
    }
}
