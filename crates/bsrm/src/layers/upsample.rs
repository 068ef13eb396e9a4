//! # Sub-Pixel Upsampling
//!
//! Learned upsampling for super-resolution tails:
//!
//! * [`pixel_shuffle`] / [`PixelShuffle`] - the parameter-free
//!   rearrangement of ``[batch, channels * r^2, height, width]`` into
//!   ``[batch, channels, height * r, width * r]``.
//! * [`SubPixelConv2d`] - a channel-expanding convolution followed by a
//!   pixel shuffle (the efficient sub-pixel convolution of Shi et al.,
//!   2016).
//! * [`Upsample2d`] - a whole-scale upsampler that decomposes the
//!   requested scale into x2 and x3 stages.

use crate::layers::activation::{Activation, ActivationConfig};
use crate::layers::norm::{Normalization, NormalizationConfig};
use burn::config::Config;
use burn::nn::PaddingConfig2d;
use burn::nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig};
use burn::prelude::{Backend, Module, Tensor};
use serde::{Deserialize, Serialize};

/// Rearrange ``[batch, channels * factor^2, height, width]`` into
/// ``[batch, channels, height * factor, width * factor]``.
///
/// Each block of ``factor^2`` input channels becomes a ``factor x
/// factor`` spatial tile of one output channel.
///
/// # Panics
///
/// If the channel count is not divisible by ``factor^2``.
pub fn pixel_shuffle<B: Backend>(
    input: Tensor<B, 4>,
    factor: usize,
) -> Tensor<B, 4> {
    let [batch, in_channels, height, width] = input.dims();
    let factor_sq = factor * factor;
    assert_eq!(
        in_channels % factor_sq,
        0,
        "pixel_shuffle: {in_channels} channels not divisible by factor^2 ({factor_sq})",
    );
    let out_channels = in_channels / factor_sq;

    input
        .reshape([batch, out_channels, factor, factor, height, width])
        // [batch, out_channels, height, factor, width, factor]
        .permute([0, 1, 4, 2, 5, 3])
        .reshape([batch, out_channels, height * factor, width * factor])
}

/// Module wrapper over [`pixel_shuffle`].
#[derive(Module, Debug, Clone)]
pub struct PixelShuffle {
    /// Spatial upscale factor.
    pub factor: usize,
}

impl PixelShuffle {
    /// Create a [`PixelShuffle`] layer.
    pub fn new(factor: usize) -> Self {
        Self { factor }
    }

    /// Forward Pass; see [`pixel_shuffle`].
    pub fn forward<B: Backend>(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        pixel_shuffle(input, self.factor)
    }
}

/// [`SubPixelConv2d`] Config.
#[derive(Config, Debug)]
pub struct SubPixelConv2dConfig {
    /// Feature width (input and output channels).
    pub n_feats: usize,

    /// Spatial upscale factor of this stage.
    pub factor: usize,

    /// Kernel size of the expanding convolution.
    #[config(default = 3)]
    pub kernel_size: usize,

    /// Whether the convolution carries a bias.
    #[config(default = true)]
    pub bias: bool,

    /// Optional norm after the shuffle.
    #[config(default = "None")]
    pub norm: Option<NormalizationConfig>,

    /// Optional activation after the shuffle.
    #[config(default = "None")]
    pub act: Option<ActivationConfig>,
}

impl SubPixelConv2dConfig {
    /// Initialize a [`SubPixelConv2d`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> SubPixelConv2d<B> {
        let pad = self.kernel_size / 2;
        let expanded = self.n_feats * self.factor * self.factor;

        SubPixelConv2d {
            conv: Conv2dConfig::new(
                [self.n_feats, expanded],
                [self.kernel_size, self.kernel_size],
            )
            .with_padding(PaddingConfig2d::Explicit(pad, pad))
            .with_bias(self.bias)
            .init(device),
            shuffle: PixelShuffle::new(self.factor),
            norm: self
                .norm
                .clone()
                .map(|norm| norm.with_num_features(self.n_feats).init(device)),
            act: self.act.as_ref().map(|act| act.init(device)),
        }
    }
}

/// One sub-pixel convolution stage: expand channels by ``factor^2``,
/// then shuffle them into space.
#[derive(Module, Debug)]
pub struct SubPixelConv2d<B: Backend> {
    /// Channel-expanding convolution.
    pub conv: Conv2d<B>,

    /// Shuffle layer.
    pub shuffle: PixelShuffle,

    /// Optional norm layer.
    pub norm: Option<Normalization<B>>,

    /// Optional activation layer.
    pub act: Option<Activation<B>>,
}

impl<B: Backend> SubPixelConv2d<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, n_feats, height, width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, n_feats, height * factor, width * factor]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.conv.forward(input);
        let x = self.shuffle.forward(x);

        let x = match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        };

        match &self.act {
            Some(act) => act.forward(x),
            None => x,
        }
    }
}

/// How an [`Upsample2d`] stage enlarges the feature map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsampleMethod {
    /// Sub-pixel convolution (conv + pixel shuffle).
    SubPixel,

    /// Transposed convolution.
    Deconv,
}

/// Decompose an upsampling scale into per-stage factors.
///
/// Power-of-two scales become ``log2(scale)`` x2 stages; scale 3 is a
/// single x3 stage. Scale 1 decomposes into no stages at all.
///
/// # Panics
///
/// For any other scale.
pub fn scale_factors(scale: usize) -> Vec<usize> {
    if scale > 0 && scale.is_power_of_two() {
        vec![2; scale.trailing_zeros() as usize]
    } else if scale == 3 {
        vec![3]
    } else {
        panic!("unsupported upsampling scale: {scale}");
    }
}

/// [`Upsample2d`] Config.
#[derive(Config, Debug)]
pub struct Upsample2dConfig {
    /// Total spatial upscale factor; a power of two, or 3.
    pub scale: usize,

    /// Feature width (input and output channels).
    pub n_feats: usize,

    /// Kernel size of the sub-pixel convolutions.
    #[config(default = 3)]
    pub kernel_size: usize,

    /// Whether the convolutions carry a bias.
    #[config(default = true)]
    pub bias: bool,

    /// Stage construction method.
    #[config(default = "UpsampleMethod::SubPixel")]
    pub method: UpsampleMethod,

    /// Optional per-stage norm.
    #[config(default = "None")]
    pub norm: Option<NormalizationConfig>,

    /// Optional per-stage activation.
    #[config(default = "None")]
    pub act: Option<ActivationConfig>,
}

impl Upsample2dConfig {
    /// Initialize an [`Upsample2d`].
    ///
    /// # Panics
    ///
    /// If the scale is not a power of two or 3.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Upsample2d<B> {
        let stages = scale_factors(self.scale)
            .into_iter()
            .map(|factor| match self.method {
                UpsampleMethod::SubPixel => UpsampleStage::SubPixel(
                    SubPixelConv2dConfig::new(self.n_feats, factor)
                        .with_kernel_size(self.kernel_size)
                        .with_bias(self.bias)
                        .with_norm(self.norm.clone())
                        .with_act(self.act.clone())
                        .init(device),
                ),
                UpsampleMethod::Deconv => UpsampleStage::Deconv(DeconvStage {
                    conv: ConvTranspose2dConfig::new(
                        [self.n_feats, self.n_feats],
                        [factor, factor],
                    )
                    .with_stride([factor, factor])
                    .with_bias(self.bias)
                    .init(device),
                    factor,
                }),
            })
            .collect();

        Upsample2d { stages }
    }
}

/// One transposed-convolution stage.
#[derive(Module, Debug)]
pub struct DeconvStage<B: Backend> {
    /// Transposed convolution; kernel and stride both equal `factor`.
    pub conv: ConvTranspose2d<B>,

    /// Spatial upscale factor of this stage.
    pub factor: usize,
}

/// One stage of an [`Upsample2d`].
#[derive(Module, Debug)]
pub enum UpsampleStage<B: Backend> {
    /// Sub-pixel convolution stage.
    SubPixel(SubPixelConv2d<B>),

    /// Transposed convolution stage.
    Deconv(DeconvStage<B>),
}

impl<B: Backend> UpsampleStage<B> {
    fn factor(&self) -> usize {
        match self {
            UpsampleStage::SubPixel(stage) => stage.shuffle.factor,
            UpsampleStage::Deconv(stage) => stage.factor,
        }
    }

    fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            UpsampleStage::SubPixel(stage) => stage.forward(input),
            UpsampleStage::Deconv(stage) => stage.conv.forward(input),
        }
    }
}

/// Whole-scale learned upsampler.
///
/// Scale 1 holds no stages and passes the input through unchanged.
#[derive(Module, Debug)]
pub struct Upsample2d<B: Backend> {
    /// The per-factor stages.
    pub stages: Vec<UpsampleStage<B>>,
}

impl<B: Backend> Upsample2d<B> {
    /// The total spatial upscale factor.
    pub fn scale(&self) -> usize {
        self.stages.iter().map(UpsampleStage::factor).product()
    }

    /// Get the output resolution for a given input resolution.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        let scale = self.scale();
        [input_resolution[0] * scale, input_resolution[1] * scale]
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, n_feats, height, width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, n_feats, height * scale, width * scale]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.stages
            .iter()
            .fold(input, |x, stage| stage.forward(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_pixel_shuffle_values() {
        let device = Default::default();

        // [1, 4, 1, 2]; channel blocks become 2x2 tiles.
        let input = Tensor::<TestBackend, 4>::from_data(
            [[[[0.0, 1.0]], [[2.0, 3.0]], [[4.0, 5.0]], [[6.0, 7.0]]]],
            &device,
        );

        let output = pixel_shuffle(input, 2);
        assert_eq!(output.dims(), [1, 1, 2, 4]);

        let expected = Tensor::<TestBackend, 4>::from_data(
            [[[[0.0, 2.0, 1.0, 3.0], [4.0, 6.0, 5.0, 7.0]]]],
            &device,
        );
        output.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    #[should_panic(expected = "not divisible")]
    fn test_pixel_shuffle_bad_channels() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 4>::zeros([1, 6, 2, 2], &device);
        let _ = pixel_shuffle(input, 2);
    }

    #[test]
    fn test_scale_factors() {
        assert_eq!(scale_factors(1), Vec::<usize>::new());
        assert_eq!(scale_factors(2), vec![2]);
        assert_eq!(scale_factors(3), vec![3]);
        assert_eq!(scale_factors(4), vec![2, 2]);
        assert_eq!(scale_factors(8), vec![2, 2, 2]);
    }

    #[test]
    #[should_panic(expected = "unsupported upsampling scale: 5")]
    fn test_unsupported_scale() {
        let _ = scale_factors(5);
    }

    #[test]
    fn test_sub_pixel_conv() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let stage: SubPixelConv2d<B> = SubPixelConv2dConfig::new(4, 2)
            .with_act(Some(ActivationConfig::Relu))
            .init(&device);

        let input = Tensor::random([2, 4, 5, 5], Distribution::Default, &device);
        let output = stage.forward(input);

        assert_shape_contract!(
            ["batch", "n_feats", "height", "width"],
            &output,
            &[("batch", 2), ("n_feats", 4), ("height", 10), ("width", 10)],
        );
    }

    #[test]
    fn test_upsample_shapes() {
        let device = Default::default();

        for (scale, expected) in [(1, 4), (2, 8), (3, 12), (4, 16)] {
            let up: Upsample2d<TestBackend> = Upsample2dConfig::new(scale, 4).init(&device);
            assert_eq!(up.scale(), scale);
            assert_eq!(up.output_resolution([4, 4]), [expected, expected]);

            let input = Tensor::random([1, 4, 4, 4], Distribution::Default, &device);
            let output = up.forward(input);
            assert_eq!(output.dims(), [1, 4, expected, expected]);
        }
    }

    #[test]
    fn test_upsample_deconv() {
        let device = Default::default();

        let up: Upsample2d<TestBackend> = Upsample2dConfig::new(4, 4)
            .with_method(UpsampleMethod::Deconv)
            .init(&device);
        assert_eq!(up.scale(), 4);

        let input = Tensor::random([1, 4, 3, 3], Distribution::Default, &device);
        assert_eq!(up.forward(input).dims(), [1, 4, 12, 12]);
    }

    #[test]
    #[should_panic(expected = "unsupported upsampling scale")]
    fn test_upsample_unsupported_scale() {
        let device = Default::default();
        let _: Upsample2d<TestBackend> = Upsample2dConfig::new(5, 4).init(&device);
    }
}
