//! # Dense Layers and Residual Dense Blocks
//!
//! [`DenseLayer2d`] is a conv + ReLU whose output is concatenated with
//! its input along the channel dimension, so every later layer sees
//! every earlier feature.
//!
//! [`ResidualDenseBlock2d`] chains dense layers, fuses the accumulated
//! features back down with a 1x1 convolution (local feature fusion),
//! and closes with a local residual connection. Output channels always
//! equal input channels, so blocks stack freely.

use crate::layers::activation::{Activation, ActivationConfig};
use bimm_contracts::{run_every_nth, shape_contract, ShapeContract};
use burn::config::Config;
use burn::nn::PaddingConfig2d;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::prelude::{Backend, Module, Tensor};

/// [`DenseLayer2d`] Config.
#[derive(Config, Debug)]
pub struct DenseLayer2dConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// Number of channels produced by the convolution.
    pub growth_rate: usize,

    /// Kernel size of the convolution.
    #[config(default = 3)]
    pub kernel_size: usize,

    /// Whether the convolution carries a bias.
    #[config(default = false)]
    pub bias: bool,

    /// Whether to concatenate the input onto the output.
    ///
    /// Disabled for the terminal layer of a chain.
    #[config(default = true)]
    pub concat: bool,
}

impl DenseLayer2dConfig {
    /// Output channels: ``growth_rate``, plus ``in_channels`` when
    /// concatenating.
    pub fn out_channels(&self) -> usize {
        if self.concat {
            self.in_channels + self.growth_rate
        } else {
            self.growth_rate
        }
    }

    /// Initialize a [`DenseLayer2d`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> DenseLayer2d<B> {
        let pad = self.kernel_size / 2;
        DenseLayer2d {
            conv: Conv2dConfig::new(
                [self.in_channels, self.growth_rate],
                [self.kernel_size, self.kernel_size],
            )
            .with_padding(PaddingConfig2d::Explicit(pad, pad))
            .with_bias(self.bias)
            .init(device),
            act: ActivationConfig::Relu.init(device),
            concat: self.concat,
        }
    }
}

/// Densely-connected conv layer.
#[derive(Module, Debug)]
pub struct DenseLayer2d<B: Backend> {
    /// Internal Conv2d layer.
    pub conv: Conv2d<B>,

    /// Activation layer.
    pub act: Activation<B>,

    /// Whether the input is concatenated onto the output.
    pub concat: bool,
}

impl<B: Backend> DenseLayer2d<B> {
    /// Number of input channels.
    pub fn in_channels(&self) -> usize {
        self.conv.weight.shape().dims[1]
    }

    /// Number of output channels.
    pub fn out_channels(&self) -> usize {
        let growth = self.conv.weight.shape().dims[0];
        if self.concat {
            self.in_channels() + growth
        } else {
            growth
        }
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_channels, height, width]`` tensor; the input
    /// rides along in the channel dimension when `concat` is set.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.conv.forward(input.clone());
        let x = self.act.forward(x);

        if self.concat {
            Tensor::cat(vec![x, input], 1)
        } else {
            x
        }
    }
}

/// [`ResidualDenseBlock2d`] Config.
#[derive(Config, Debug)]
pub struct ResidualDenseBlock2dConfig {
    /// Number of input (and output) channels.
    pub in_channels: usize,

    /// Number of dense layers.
    pub n_layers: usize,

    /// Channels added by each dense layer.
    pub growth_rate: usize,

    /// Kernel size of the dense convolutions.
    #[config(default = 3)]
    pub kernel_size: usize,

    /// Whether the dense convolutions carry a bias.
    #[config(default = false)]
    pub bias: bool,
}

impl ResidualDenseBlock2dConfig {
    /// Channel width seen by the fusion conv.
    fn fused_channels(&self) -> usize {
        self.in_channels + self.n_layers * self.growth_rate
    }

    /// Initialize a [`ResidualDenseBlock2d`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResidualDenseBlock2d<B> {
        let layers = (0..self.n_layers)
            .map(|i| {
                DenseLayer2dConfig::new(
                    self.in_channels + i * self.growth_rate,
                    self.growth_rate,
                )
                .with_kernel_size(self.kernel_size)
                .with_bias(self.bias)
                .init(device)
            })
            .collect();

        // Local feature fusion: 1x1 back down to the block width.
        let fusion = Conv2dConfig::new([self.fused_channels(), self.in_channels], [1, 1])
            .with_bias(true)
            .init(device);

        ResidualDenseBlock2d { layers, fusion }
    }
}

/// Residual dense block (RDB).
#[derive(Module, Debug)]
pub struct ResidualDenseBlock2d<B: Backend> {
    /// Dense layers; layer `i` sees `in_channels + i * growth_rate`
    /// channels.
    pub layers: Vec<DenseLayer2d<B>>,

    /// Local feature fusion conv (1x1).
    pub fusion: Conv2d<B>,
}

impl<B: Backend> ResidualDenseBlock2d<B> {
    /// Number of input (and output) channels.
    pub fn in_channels(&self) -> usize {
        match self.layers.first() {
            Some(layer) => layer.in_channels(),
            None => self.fusion.weight.shape().dims[0],
        }
    }

    /// Number of dense layers.
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, in_channels, height, width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        static INPUT_CONTRACT: ShapeContract =
            shape_contract!["batch", "in_channels", "height", "width"];
        let [batch, height, width] = INPUT_CONTRACT.unpack_shape(
            &input,
            &["batch", "height", "width"],
            &[("in_channels", self.in_channels())],
        );

        let mut x = input.clone();
        for layer in &self.layers {
            x = layer.forward(x);
        }

        let out = self.fusion.forward(x) + input;

        run_every_nth!({
            static OUTPUT_CONTRACT: ShapeContract =
                shape_contract!["batch", "in_channels", "height", "width"];
            OUTPUT_CONTRACT.assert_shape(
                &out,
                &[
                    ("batch", batch),
                    ("in_channels", self.in_channels()),
                    ("height", height),
                    ("width", width),
                ],
            );
        });

        out
    }
}
