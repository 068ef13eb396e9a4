//! # Combined Super-Resolution Loss
//!
//! The training objective for the models in this crate: a pixel
//! reconstruction term (MSE) plus a weighted edge term
//! ([`GradientMagnitudeLoss`]).

use crate::loss::gradient::{GradientMagnitudeLoss, GradientMagnitudeLossConfig};
use burn::config::Config;
use burn::nn::loss::{MseLoss, Reduction};
use burn::prelude::{Backend, Module, Tensor};

/// [`SuperResolutionLoss`] Config.
#[derive(Config, Debug)]
pub struct SuperResolutionLossConfig {
    /// Number of image channels.
    #[config(default = 3)]
    pub num_channels: usize,

    /// Weight of the edge term relative to the pixel term.
    #[config(default = 0.1)]
    pub edge_weight: f64,
}

impl SuperResolutionLossConfig {
    /// Initialize a [`SuperResolutionLoss`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> SuperResolutionLoss<B> {
        SuperResolutionLoss {
            edge: GradientMagnitudeLossConfig::new()
                .with_num_channels(self.num_channels)
                .init(device),
            edge_weight: self.edge_weight,
        }
    }
}

/// Pixel MSE plus weighted gradient-magnitude error.
///
/// An `edge_weight` of zero reduces the loss to plain MSE.
#[derive(Module, Debug)]
pub struct SuperResolutionLoss<B: Backend> {
    /// Edge term.
    pub edge: GradientMagnitudeLoss<B>,

    /// Weight of the edge term.
    pub edge_weight: f64,
}

impl<B: Backend> SuperResolutionLoss<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, height, width]`` reconstruction.
    /// - `target`: ``[batch, channels, height, width]`` reference.
    ///
    /// # Returns
    ///
    /// A scalar ``[1]`` loss tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
        target: Tensor<B, 4>,
    ) -> Tensor<B, 1> {
        let pixel = MseLoss::new().forward(input.clone(), target.clone(), Reduction::Mean);

        if self.edge_weight == 0.0 {
            return pixel;
        }

        let edge = self.edge.forward(input, target);
        pixel + edge.mul_scalar(self.edge_weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_zero_for_identical_inputs() {
        let device = Default::default();
        let loss: SuperResolutionLoss<TestBackend> =
            SuperResolutionLossConfig::new().init(&device);

        let images =
            Tensor::random([2, 3, 8, 8], Distribution::Uniform(0.0, 255.0), &device);
        let value: f32 = loss.forward(images.clone(), images).into_scalar();
        assert_eq!(value, 0.0);
    }

    #[test]
    fn test_zero_edge_weight_is_mse() {
        let device = Default::default();
        let loss: SuperResolutionLoss<TestBackend> = SuperResolutionLossConfig::new()
            .with_edge_weight(0.0)
            .init(&device);

        let input = Tensor::random([2, 3, 8, 8], Distribution::Default, &device);
        let target = Tensor::random([2, 3, 8, 8], Distribution::Default, &device);

        let value = loss.forward(input.clone(), target.clone());
        let expected = MseLoss::new().forward(input, target, Reduction::Mean);
        value.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_edge_term_adds_to_pixel_term() {
        let device = Default::default();

        let input = Tensor::random([1, 3, 8, 8], Distribution::Uniform(0.0, 255.0), &device);
        let target = Tensor::random([1, 3, 8, 8], Distribution::Uniform(0.0, 255.0), &device);

        let plain: SuperResolutionLoss<TestBackend> = SuperResolutionLossConfig::new()
            .with_edge_weight(0.0)
            .init(&device);
        let weighted: SuperResolutionLoss<TestBackend> = SuperResolutionLossConfig::new()
            .with_edge_weight(0.5)
            .init(&device);

        let plain_value: f32 = plain.forward(input.clone(), target.clone()).into_scalar();
        let weighted_value: f32 = weighted.forward(input, target).into_scalar();

        // Random natural-range images essentially never have exactly
        // matching edge magnitudes.
        assert!(weighted_value > plain_value);
    }
}
