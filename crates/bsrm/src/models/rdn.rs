//! # RDN - Residual Dense Network
//!
//! A dense trunk (Zhang et al., 2018):
//!
//! ```text
//! input -> mean-shift(sub) -> sfe1 -> sfe2
//!       -> D x ResidualDenseBlock2d (outputs collected)
//!       -> global feature fusion over cat(outputs) -> (+ sfe1 output)
//!       -> Upsample2d -> reconstruction conv -> mean-shift(add)
//! ```
//!
//! Every block output feeds the global fusion, so shallow and deep
//! features both reach the upsampler.

use crate::layers::blocks::conv_block::{ConvBlock2d, ConvBlock2dConfig};
use crate::layers::blocks::dense::{ResidualDenseBlock2d, ResidualDenseBlock2dConfig};
use crate::layers::color::{MeanShift, MeanShiftConfig, MeanShiftDirection};
use crate::layers::upsample::{Upsample2d, Upsample2dConfig};
use bimm_contracts::{run_every_nth, shape_contract, ShapeContract};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// [`Rdn`] Config.
#[derive(Config, Debug)]
pub struct RdnConfig {
    /// Spatial upscale factor; a power of two, or 3.
    #[config(default = 2)]
    pub scale: usize,

    /// Number of residual dense blocks (D).
    #[config(default = 16)]
    pub n_blocks: usize,

    /// Dense layers per block (C).
    #[config(default = 8)]
    pub n_layers: usize,

    /// Channels added per dense layer (G).
    #[config(default = 64)]
    pub growth_rate: usize,

    /// Feature width outside the blocks (G0).
    #[config(default = 64)]
    pub n_feats: usize,

    /// Kernel size of the trunk convolutions.
    #[config(default = 3)]
    pub kernel_size: usize,

    /// Color statistics for the mean-shift wrappers.
    #[config(default = "MeanShiftConfig::new()")]
    pub color: MeanShiftConfig,
}

impl RdnConfig {
    /// Initialize an [`Rdn`] model.
    ///
    /// # Panics
    ///
    /// If the scale is not a power of two or 3.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Rdn<B> {
        let blocks: Vec<_> = (0..self.n_blocks)
            .map(|_| {
                ResidualDenseBlock2dConfig::new(self.n_feats, self.n_layers, self.growth_rate)
                    .with_kernel_size(self.kernel_size)
                    .init(device)
            })
            .collect();

        // Global feature fusion: 1x1 over every block output, then 3x3.
        let fusion_in = self.n_blocks * self.n_feats;
        let gff1 = ConvBlock2dConfig::same(fusion_in, self.n_feats, 1).init(device);
        let gff2 =
            ConvBlock2dConfig::same(self.n_feats, self.n_feats, self.kernel_size).init(device);

        Rdn {
            sub_mean: self
                .color
                .clone()
                .with_direction(MeanShiftDirection::Sub)
                .init(device),
            sfe1: ConvBlock2dConfig::same(3, self.n_feats, self.kernel_size).init(device),
            sfe2: ConvBlock2dConfig::same(self.n_feats, self.n_feats, self.kernel_size)
                .init(device),
            blocks,
            gff1,
            gff2,
            upsample: Upsample2dConfig::new(self.scale, self.n_feats)
                .with_kernel_size(self.kernel_size)
                .init(device),
            recon: ConvBlock2dConfig::same(self.n_feats, 3, self.kernel_size).init(device),
            add_mean: self
                .color
                .clone()
                .with_direction(MeanShiftDirection::Add)
                .init(device),
        }
    }
}

/// RDN super-resolution model.
#[derive(Module, Debug)]
pub struct Rdn<B: Backend> {
    /// Input mean shift.
    pub sub_mean: MeanShift<B>,

    /// First shallow feature conv; also the global residual source.
    pub sfe1: ConvBlock2d<B>,

    /// Second shallow feature conv.
    pub sfe2: ConvBlock2d<B>,

    /// Residual dense trunk.
    pub blocks: Vec<ResidualDenseBlock2d<B>>,

    /// Global feature fusion, 1x1 over the concatenated block outputs.
    pub gff1: ConvBlock2d<B>,

    /// Global feature fusion, closing 3x3.
    pub gff2: ConvBlock2d<B>,

    /// Learned upsampler.
    pub upsample: Upsample2d<B>,

    /// Reconstruction conv, `n_feats` back to 3 channels.
    pub recon: ConvBlock2d<B>,

    /// Output mean shift.
    pub add_mean: MeanShift<B>,
}

impl<B: Backend> Rdn<B> {
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
        let shallow = self.sfe1.forward(x);
        let mut x = self.sfe2.forward(shallow.clone());

        let mut features = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            x = block.forward(x);
            features.push(x.clone());
        }

        let fused = self.gff1.forward(Tensor::cat(features, 1));
        let x = self.gff2.forward(fused) + shallow;

        let x = self.upsample.forward(x);
        let x = self.recon.forward(x);
        let out = self.add_mean.forward(x);

        let scale = self.scale();
        run_every_nth!({
            static OUTPUT_CONTRACT: ShapeContract =
                shape_contract!["batch", "channels", "out_height", "out_width"];
            OUTPUT_CONTRACT.assert_shape(
                &out,
                &[
                    ("batch", batch),
                    ("channels", 3),
                    ("out_height", height * scale),
                    ("out_width", width * scale),
                ],
            );
        });

        out
    }
}
