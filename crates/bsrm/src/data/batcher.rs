//! # Pair Loading and Batching
//!
//! Turns scanned [`SrImagePair`] items into training batches: decodes
//! both images, checks that the pair's resolutions agree with its
//! scale, and stacks everything into ``[batch, 3, height, width]``
//! float tensors in ``[0, rgb_range]``.

use crate::data::pairs::{SrDatasetError, SrImagePair};
use burn::data::dataloader::batcher::Batcher;
use burn::prelude::{Backend, Tensor};
use burn::tensor::TensorData;
use std::path::Path;

/// Decode an image into a ``[3, height, width]`` float tensor with
/// values in ``[0, 255]``.
pub fn load_rgb_tensor<B: Backend, P: AsRef<Path>>(
    path: P,
    device: &B::Device,
) -> Result<Tensor<B, 3>, SrDatasetError> {
    let image = image::open(path)?.into_rgb8();
    let (width, height) = image.dimensions();

    let data = TensorData::new(
        image.into_raw(),
        [height as usize, width as usize, 3],
    );

    // [height, width, 3] -> [3, height, width]
    Ok(Tensor::from_data(data.convert::<B::FloatElem>(), device)
        .swap_dims(2, 1)
        .swap_dims(1, 0))
}

impl SrImagePair {
    /// Load the pair as ``(lr, hr)`` tensors with values in
    /// ``[0, 255]``.
    ///
    /// # Errors
    ///
    /// [`SrDatasetError::DimensionMismatch`] when the high-resolution
    /// image is not exactly ``scale`` times the low-resolution image.
    pub fn load<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<(Tensor<B, 3>, Tensor<B, 3>), SrDatasetError> {
        let lr = load_rgb_tensor(&self.lr, device)?;
        let hr = load_rgb_tensor(&self.hr, device)?;

        let [_, lr_height, lr_width] = lr.dims();
        let [_, hr_height, hr_width] = hr.dims();
        if hr_height != lr_height * self.scale || hr_width != lr_width * self.scale {
            return Err(SrDatasetError::DimensionMismatch {
                lr: self.lr.clone(),
                lr_width: lr_width as u32,
                lr_height: lr_height as u32,
                hr_width: hr_width as u32,
                hr_height: hr_height as u32,
                scale: self.scale,
            });
        }

        Ok((lr, hr))
    }
}

/// A batch of loaded pairs.
#[derive(Clone, Debug)]
pub struct SrBatch<B: Backend> {
    /// Low-resolution inputs, ``[batch, 3, height, width]``.
    pub lr: Tensor<B, 4>,

    /// High-resolution targets,
    /// ``[batch, 3, scale * height, scale * width]``.
    pub hr: Tensor<B, 4>,

    /// The pairs the batch was loaded from.
    pub pairs: Vec<SrImagePair>,
}

/// [`Batcher`] for [`SrImagePair`] items.
///
/// All pairs in one batch must share a resolution; benchmark sets with
/// mixed sizes are evaluated with a batch size of one.
#[derive(Clone, Debug)]
pub struct SrBatcher {
    /// Target sample range; decoded ``[0, 255]`` values are rescaled
    /// to ``[0, rgb_range]``.
    pub rgb_range: f64,
}

impl SrBatcher {
    /// Create a batcher with the given sample range.
    pub fn new(rgb_range: f64) -> Self {
        Self { rgb_range }
    }
}

impl Default for SrBatcher {
    fn default() -> Self {
        Self::new(255.0)
    }
}

impl<B: Backend> Batcher<B, SrImagePair, SrBatch<B>> for SrBatcher {
    /// # Panics
    ///
    /// On undecodable images, mismatched pair dimensions, or mixed
    /// resolutions within the batch.
    fn batch(
        &self,
        items: Vec<SrImagePair>,
        device: &B::Device,
    ) -> SrBatch<B> {
        let mut lr_images = Vec::with_capacity(items.len());
        let mut hr_images = Vec::with_capacity(items.len());

        for pair in &items {
            let (lr, hr) = pair
                .load(device)
                .unwrap_or_else(|err| panic!("failed to load `{}`: {err}", pair.hr.display()));
            lr_images.push(lr);
            hr_images.push(hr);
        }

        let rescale = self.rgb_range / 255.0;
        let lr = Tensor::stack(lr_images, 0).mul_scalar(rescale);
        let hr = Tensor::stack(hr_images, 0).mul_scalar(rescale);

        SrBatch {
            lr,
            hr,
            pairs: items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use image::{Rgb, RgbImage};

    type TestBackend = NdArray<f32>;

    fn write_pair(
        dir: &Path,
        lr_size: u32,
        hr_size: u32,
        scale: usize,
    ) -> SrImagePair {
        let hr = dir.join("img.png");
        let lr = dir.join(format!("imgx{scale}.png"));
        RgbImage::from_pixel(hr_size, hr_size, Rgb([10, 20, 30]))
            .save(&hr)
            .unwrap();
        RgbImage::from_pixel(lr_size, lr_size, Rgb([10, 20, 30]))
            .save(&lr)
            .unwrap();
        SrImagePair { hr, lr, scale }
    }

    #[test]
    fn test_load_rgb_tensor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        RgbImage::from_pixel(3, 2, Rgb([10, 20, 30])).save(&path).unwrap();

        let tensor: Tensor<TestBackend, 3> = load_rgb_tensor(&path, &Default::default()).unwrap();
        assert_eq!(tensor.dims(), [3, 2, 3]);

        // Channel planes are constant at the pixel values.
        let data = tensor.to_data().to_vec::<f32>().unwrap();
        assert_eq!(&data[0..6], &[10.0; 6]);
        assert_eq!(&data[6..12], &[20.0; 6]);
        assert_eq!(&data[12..18], &[30.0; 6]);
    }

    #[test]
    fn test_pair_load_checks_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let pair = write_pair(dir.path(), 3, 8, 2);

        let result = pair.load::<TestBackend>(&Default::default());
        assert!(matches!(
            result,
            Err(SrDatasetError::DimensionMismatch { scale: 2, .. })
        ));
    }

    #[test]
    fn test_batcher() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let pairs = vec![
            write_pair(dir_a.path(), 4, 8, 2),
            write_pair(dir_b.path(), 4, 8, 2),
        ];

        let batcher = SrBatcher::default();
        let batch: SrBatch<TestBackend> = batcher.batch(pairs.clone(), &Default::default());

        assert_eq!(batch.lr.dims(), [2, 3, 4, 4]);
        assert_eq!(batch.hr.dims(), [2, 3, 8, 8]);
        assert_eq!(batch.pairs, pairs);

        // rgb_range 255 keeps 8-bit sample values as-is.
        let max: f32 = batch.hr.max().into_scalar();
        assert_eq!(max, 30.0);
    }

    #[test]
    fn test_batcher_rescales_range() {
        let dir = tempfile::tempdir().unwrap();
        let pair = write_pair(dir.path(), 4, 8, 2);

        let batcher = SrBatcher::new(1.0);
        let batch: SrBatch<TestBackend> = batcher.batch(vec![pair], &Default::default());

        let max: f32 = batch.hr.max().into_scalar();
        assert!((max - 30.0 / 255.0).abs() < 1e-6);
    }
}
