//! # Gradient-Magnitude Loss
//!
//! [`GradientMagnitudeLoss`] compares the squared Sobel edge magnitude
//! of a reconstruction against that of its target. Pixel losses alone
//! reward blurry reconstructions; penalizing edge-magnitude error
//! pushes the network to keep gradients as sharp as the target's.
//!
//! The Sobel kernels are fixed constants, applied as un-padded
//! convolutions with a diagonal channel structure (each channel is
//! filtered independently).

use burn::prelude::{Backend, Config, Module, Tensor};
use burn::tensor::TensorData;
use burn::tensor::module::conv2d;
use burn::tensor::ops::ConvOptions;

/// Sobel kernel responding to horizontal edges (vertical gradient).
const SOBEL_H: [f32; 9] = [1.0, 2.0, 1.0, 0.0, 0.0, 0.0, -1.0, -2.0, -1.0];

/// Sobel kernel responding to vertical edges (horizontal gradient).
const SOBEL_V: [f32; 9] = [1.0, 0.0, -1.0, 2.0, 0.0, -2.0, 1.0, 0.0, -1.0];

/// Build a ``[channels, channels, 3, 3]`` kernel with `cell` on the
/// channel diagonal and zeros elsewhere.
fn diagonal_kernel<B: Backend>(
    cell: &[f32; 9],
    channels: usize,
    device: &B::Device,
) -> Tensor<B, 4> {
    let mut values = vec![0.0f32; channels * channels * 9];
    for c in 0..channels {
        let base = (c * channels + c) * 9;
        values[base..base + 9].copy_from_slice(cell);
    }
    Tensor::from_data(
        TensorData::new(values, [channels, channels, 3, 3]),
        device,
    )
}

/// [`GradientMagnitudeLoss`] Config.
#[derive(Config, Debug)]
pub struct GradientMagnitudeLossConfig {
    /// Number of image channels.
    #[config(default = 3)]
    pub num_channels: usize,
}

impl GradientMagnitudeLossConfig {
    /// Initialize a [`GradientMagnitudeLoss`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> GradientMagnitudeLoss<B> {
        GradientMagnitudeLoss {
            h_kernel: diagonal_kernel(&SOBEL_H, self.num_channels, device),
            v_kernel: diagonal_kernel(&SOBEL_V, self.num_channels, device),
        }
    }
}

/// L2 loss over Sobel edge-magnitude images.
///
/// The kernels are constants; they are never trained.
#[derive(Module, Debug)]
pub struct GradientMagnitudeLoss<B: Backend> {
    /// Horizontal-edge kernel, ``[channels, channels, 3, 3]``.
    pub h_kernel: Tensor<B, 4>,

    /// Vertical-edge kernel, ``[channels, channels, 3, 3]``.
    pub v_kernel: Tensor<B, 4>,
}

impl<B: Backend> GradientMagnitudeLoss<B> {
    /// Number of image channels the kernels were built for.
    pub fn num_channels(&self) -> usize {
        self.h_kernel.shape().dims[0]
    }

    /// Squared edge magnitude, ``v^2 + h^2``.
    ///
    /// # Arguments
    ///
    /// - `images`: ``[batch, channels, height, width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, channels, height - 2, width - 2]`` tensor; the
    /// un-padded 3x3 convolutions trim a one-pixel border.
    pub fn edge_magnitude(
        &self,
        images: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let options = ConvOptions::new([1, 1], [0, 0], [1, 1], 1);

        let v = conv2d(images.clone(), self.v_kernel.clone(), None, options.clone());
        let h = conv2d(images, self.h_kernel.clone(), None, options);

        v.powf_scalar(2.0) + h.powf_scalar(2.0)
    }

    /// Forward Pass.
    ///
    /// Mean squared difference between the edge-magnitude images of
    /// `input` and `target`.
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
        let input_mag = self.edge_magnitude(input);
        let target_mag = self.edge_magnitude(target);

        (target_mag - input_mag).powf_scalar(2.0).mean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_kernel_structure() {
        let device = Default::default();
        let loss: GradientMagnitudeLoss<TestBackend> =
            GradientMagnitudeLossConfig::new().init(&device);

        assert_eq!(loss.num_channels(), 3);
        assert_eq!(loss.h_kernel.dims(), [3, 3, 3, 3]);

        let data = loss.h_kernel.to_data().to_vec::<f32>().unwrap();
        // Diagonal cells carry the Sobel kernel; all others are zero.
        for ci in 0..3 {
            for cj in 0..3 {
                let base = (ci * 3 + cj) * 9;
                let cell = &data[base..base + 9];
                if ci == cj {
                    assert_eq!(cell, SOBEL_H);
                } else {
                    assert!(cell.iter().all(|v| *v == 0.0));
                }
            }
        }
    }

    #[test]
    fn test_zero_for_identical_inputs() {
        let device = Default::default();
        let loss: GradientMagnitudeLoss<TestBackend> =
            GradientMagnitudeLossConfig::new().init(&device);

        let images =
            Tensor::random([2, 3, 8, 8], Distribution::Uniform(0.0, 255.0), &device);
        let value: f32 = loss.forward(images.clone(), images).into_scalar();
        assert_eq!(value, 0.0);
    }

    #[test]
    fn test_zero_for_flat_images() {
        // Two constant images have no edges at all, whatever their levels.
        let device = Default::default();
        let loss: GradientMagnitudeLoss<TestBackend> =
            GradientMagnitudeLossConfig::new().init(&device);

        let a = Tensor::full([1, 3, 8, 8], 17.0, &device);
        let b = Tensor::full([1, 3, 8, 8], 200.0, &device);

        let value: f32 = loss.forward(a, b).into_scalar();
        assert_eq!(value, 0.0);
    }

    #[test]
    fn test_positive_for_edge_against_flat() {
        let device = Default::default();
        let loss: GradientMagnitudeLoss<TestBackend> =
            GradientMagnitudeLossConfig::new().with_num_channels(1).init(&device);

        // A vertical step edge down the middle.
        let mut values = vec![0.0f32; 8 * 8];
        for row in 0..8 {
            for col in 4..8 {
                values[row * 8 + col] = 1.0;
            }
        }
        let edge = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(values, [1, 1, 8, 8]),
            &device,
        );
        let flat = Tensor::zeros([1, 1, 8, 8], &device);

        let value: f32 = loss.forward(edge, flat).into_scalar();
        assert!(value > 0.0);
    }

    #[test]
    fn test_gradient_flows() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();
        let loss: GradientMagnitudeLoss<B> = GradientMagnitudeLossConfig::new().init(&device);

        let input =
            Tensor::random([1, 3, 8, 8], Distribution::Default, &device).require_grad();
        let target = Tensor::random([1, 3, 8, 8], Distribution::Default, &device);

        let value = loss.forward(input.clone(), target);
        let grads = value.backward();
        assert!(input.grad(&grads).is_some());
    }
}
