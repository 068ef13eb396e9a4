//! # `ConvBlock2d` - conv / optional norm / optional activation.
//!
//! The workhorse unit of the super-resolution trunks: a [`Conv2d`]
//! with resolution-preserving padding, optionally followed by a
//! [`Normalization`] layer and an [`Activation`] layer.

use crate::layers::activation::{Activation, ActivationConfig};
use crate::layers::norm::{Normalization, NormalizationConfig};
use bimm_contracts::{run_every_nth, shape_contract, ShapeContract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::PaddingConfig2d;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::prelude::{Backend, Tensor};

/// [`ConvBlock2d`] Meta.
pub trait ConvBlock2dMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// Get the stride.
    fn stride(&self) -> [usize; 2];
}

/// [`ConvBlock2d`] Config.
#[derive(Config, Debug)]
pub struct ConvBlock2dConfig {
    /// The [`Conv2d`] config.
    pub conv: Conv2dConfig,

    /// Optional [`Normalization`] config; feature-matched on init.
    #[config(default = "None")]
    pub norm: Option<NormalizationConfig>,

    /// Optional [`Activation`] config.
    #[config(default = "None")]
    pub act: Option<ActivationConfig>,
}

impl From<Conv2dConfig> for ConvBlock2dConfig {
    fn from(conv: Conv2dConfig) -> Self {
        Self {
            conv,
            norm: None,
            act: None,
        }
    }
}

impl ConvBlock2dMeta for ConvBlock2dConfig {
    fn in_channels(&self) -> usize {
        self.conv.channels[0]
    }

    fn out_channels(&self) -> usize {
        self.conv.channels[1]
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }
}

impl ConvBlock2dConfig {
    /// A resolution-preserving conv config: ``kernel_size / 2`` padding,
    /// unit stride.
    pub fn same(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
    ) -> Self {
        let pad = kernel_size / 2;
        Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Explicit(pad, pad))
            .into()
    }

    /// Initialize a [`ConvBlock2d`].
    ///
    /// The norm config, if any, is feature-matched to the conv output
    /// channels.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ConvBlock2d<B> {
        let out_channels = self.out_channels();
        ConvBlock2d {
            conv: self.conv.init(device),
            norm: self
                .norm
                .map(|norm| norm.with_num_features(out_channels).init(device)),
            act: self.act.map(|act| act.init(device)),
        }
    }
}

/// Conv2d, followed by optional norm and activation layers.
#[derive(Module, Debug)]
pub struct ConvBlock2d<B: Backend> {
    /// Internal Conv2d layer.
    pub conv: Conv2d<B>,

    /// Optional norm layer.
    pub norm: Option<Normalization<B>>,

    /// Optional activation layer.
    pub act: Option<Activation<B>>,
}

impl<B: Backend> ConvBlock2dMeta for ConvBlock2d<B> {
    fn in_channels(&self) -> usize {
        self.conv.weight.shape().dims[1] * self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }
}

impl<B: Backend> ConvBlock2d<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_channels, out_height, out_width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        static INPUT_CONTRACT: ShapeContract =
            shape_contract!["batch", "in_channels", "in_height", "in_width"];
        let [batch] = INPUT_CONTRACT.unpack_shape(
            &input,
            &["batch"],
            &[("in_channels", self.in_channels())],
        );

        let x = self.conv.forward(input);

        let x = match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        };

        let x = match &self.act {
            Some(act) => act.forward(x),
            None => x,
        };

        run_every_nth!({
            static OUTPUT_CONTRACT: ShapeContract =
                shape_contract!["batch", "out_channels", "out_height", "out_width"];
            OUTPUT_CONTRACT.assert_shape(
                &x,
                &[("batch", batch), ("out_channels", self.out_channels())],
            );
        });

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::{shape_contract, ShapeContract};
    use burn::backend::{Autodiff, NdArray};
    use burn::nn::BatchNormConfig;
    use burn::tensor::Distribution;

    #[test]
    fn test_conv_block_config() {
        let config = ConvBlock2dConfig::same(2, 4, 3);
        assert_eq!(config.in_channels(), 2);
        assert_eq!(config.out_channels(), 4);
        assert_eq!(config.stride(), [1, 1]);

        let config = config
            .with_norm(Some(BatchNormConfig::new(0).into()))
            .with_act(Some(ActivationConfig::Relu));
        assert!(config.norm.is_some());
        assert!(config.act.is_some());
    }

    #[test]
    fn test_forward_preserves_resolution() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        for kernel_size in [1, 3, 5] {
            let block: ConvBlock2d<B> = ConvBlock2dConfig::same(2, 4, kernel_size)
                .with_norm(Some(BatchNormConfig::new(0).into()))
                .with_act(Some(ActivationConfig::Relu))
                .init(&device);

            let input = Tensor::random([2, 2, 8, 8], Distribution::Default, &device);
            let output = block.forward(input);

            static CONTRACT: ShapeContract =
                shape_contract!["batch", "out_channels", "height", "width"];
            CONTRACT.assert_shape(
                &output,
                &[
                    ("batch", 2),
                    ("out_channels", 4),
                    ("height", 8),
                    ("width", 8),
                ],
            );
        }
    }

    #[test]
    fn test_bare_conv_matches_inner_layer() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: ConvBlock2d<B> = ConvBlock2dConfig::same(2, 2, 3).init(&device);
        let input = Tensor::random([1, 2, 6, 6], Distribution::Default, &device);

        let output = block.forward(input.clone());
        let expected = block.conv.forward(input);
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
