//! # Mean-Shift Color Normalization
//!
//! A [`MeanShift`] layer removes (or restores) a dataset RGB mean,
//! scaled by the RGB standard deviation and the sample range. It is a
//! frozen 1x1 convolution: the weight is ``eye(3) / std`` and the bias
//! is ``sign * rgb_range * mean / std``. Neither is ever trained.
//!
//! Super-resolution networks wrap their trunk with a subtracting shift
//! on the way in and an adding shift on the way out.

use burn::prelude::{Backend, Config, Module, Tensor};
use burn::tensor::TensorData;
use burn::tensor::module::conv2d;
use burn::tensor::ops::ConvOptions;
use serde::{Deserialize, Serialize};

/// RGB channel means of the DIV2K training set, in ``[0, 1]``.
pub const DIV2K_RGB_MEAN: [f64; 3] = [0.4488, 0.4371, 0.4040];

/// Whether the shift removes or restores the mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeanShiftDirection {
    /// Subtract the mean (network input).
    Sub,

    /// Add the mean back (network output).
    Add,
}

impl MeanShiftDirection {
    fn sign(&self) -> f64 {
        match self {
            MeanShiftDirection::Sub => -1.0,
            MeanShiftDirection::Add => 1.0,
        }
    }
}

/// [`MeanShift`] Config.
#[derive(Config, Debug)]
pub struct MeanShiftConfig {
    /// Value range of the image samples (e.g. 255 for 8-bit).
    #[config(default = 255.0)]
    pub rgb_range: f64,

    /// Per-channel mean, in ``[0, 1]``.
    #[config(default = "DIV2K_RGB_MEAN")]
    pub rgb_mean: [f64; 3],

    /// Per-channel standard deviation.
    #[config(default = "[1.0, 1.0, 1.0]")]
    pub rgb_std: [f64; 3],

    /// Shift direction.
    #[config(default = "MeanShiftDirection::Sub")]
    pub direction: MeanShiftDirection,
}

impl MeanShiftConfig {
    /// Initialize a [`MeanShift`] layer.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> MeanShift<B> {
        let sign = self.direction.sign();

        let mut weight = vec![0.0f32; 9];
        for c in 0..3 {
            weight[c * 3 + c] = (1.0 / self.rgb_std[c]) as f32;
        }

        let bias: Vec<f32> = (0..3)
            .map(|c| (sign * self.rgb_range * self.rgb_mean[c] / self.rgb_std[c]) as f32)
            .collect();

        MeanShift {
            weight: Tensor::from_data(TensorData::new(weight, [3, 3, 1, 1]), device),
            bias: Tensor::from_data(TensorData::new(bias, [3]), device),
        }
    }
}

/// Frozen 1x1 mean-shift convolution.
///
/// The weight and bias are constants; gradient descent never touches
/// them.
#[derive(Module, Debug)]
pub struct MeanShift<B: Backend> {
    /// ``[3, 3, 1, 1]`` diagonal kernel, ``eye(3) / std``.
    pub weight: Tensor<B, 4>,

    /// ``[3]`` bias, ``sign * rgb_range * mean / std``.
    pub bias: Tensor<B, 1>,
}

impl<B: Backend> MeanShift<B> {
    /// Shift a ``[batch, 3, height, width]`` image batch.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        conv2d(
            input,
            self.weight.clone(),
            Some(self.bias.clone()),
            ConvOptions::new([1, 1], [0, 0], [1, 1], 1),
        )
    }
}
