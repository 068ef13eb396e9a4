//! # Paired HR/LR Image Scanning
//!
//! Super-resolution benchmark sets ship as a directory of
//! high-resolution originals plus per-scale directories of bicubic
//! low-resolution counterparts:
//!
//! ```text
//! <root>/
//!   HR/            name.png
//!   LR_bicubic/
//!     X2/          namex2.png
//!     X3/          namex3.png
//!     X4/          namex4.png
//! ```
//!
//! [`SrFolderDataset`] scans that layout (or any pair of directories
//! following the same naming rule) into [`SrImagePair`] path items.

use burn::data::dataset::Dataset;
use globwalk::DirEntry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Image file extensions the scanner accepts.
pub const SUPPORTED_FILES: [&str; 4] = ["bmp", "jpg", "jpeg", "png"];

/// Error type for the paired-image data layer.
#[derive(Error, Debug)]
pub enum SrDatasetError {
    /// A required directory does not exist.
    #[error("directory not found: `{0}`")]
    DirectoryNotFound(PathBuf),

    /// The high-resolution directory holds no supported images.
    #[error("no images found under: `{0}`")]
    NoImages(PathBuf),

    /// A high-resolution image has no low-resolution counterpart.
    #[error("missing low-resolution counterpart: `{0}`")]
    MissingLowRes(PathBuf),

    /// A path could not be split into stem and extension.
    #[error("invalid image path: `{0}`")]
    InvalidPath(PathBuf),

    /// The directory walk failed.
    #[error("scan error: `{0}`")]
    Scan(String),

    /// An image failed to decode.
    #[error("image error: `{0}`")]
    Image(#[from] image::ImageError),

    /// A pair's resolutions do not agree with its scale.
    #[error(
        "dimension mismatch: `{lr}` is {lr_width}x{lr_height}, \
         expected {hr_width}x{hr_height} / {scale}"
    )]
    DimensionMismatch {
        /// Low-resolution path.
        lr: PathBuf,
        /// Low-resolution width.
        lr_width: u32,
        /// Low-resolution height.
        lr_height: u32,
        /// High-resolution width.
        hr_width: u32,
        /// High-resolution height.
        hr_height: u32,
        /// Expected scale between the two.
        scale: usize,
    },
}

/// One high-resolution / low-resolution path pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrImagePair {
    /// High-resolution image path.
    pub hr: PathBuf,

    /// Low-resolution image path.
    pub lr: PathBuf,

    /// Scale between the two.
    pub scale: usize,
}

/// The low-resolution file name for a high-resolution path:
/// ``name.png`` maps to ``namex{scale}.png``.
fn lr_file_name(
    hr: &Path,
    scale: usize,
) -> Result<String, SrDatasetError> {
    let stem = hr
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| SrDatasetError::InvalidPath(hr.to_path_buf()))?;
    let ext = hr
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| SrDatasetError::InvalidPath(hr.to_path_buf()))?;

    Ok(format!("{stem}x{scale}.{ext}"))
}

/// A dataset of scanned [`SrImagePair`] items.
pub struct SrFolderDataset {
    pairs: Vec<SrImagePair>,
}

impl SrFolderDataset {
    /// Scan a benchmark root (``HR/`` plus ``LR_bicubic/X{scale}/``).
    pub fn new_benchmark<P: AsRef<Path>>(
        root: P,
        scale: usize,
    ) -> Result<Self, SrDatasetError> {
        let root = root.as_ref();
        Self::from_paired_dirs(
            root.join("HR"),
            root.join("LR_bicubic").join(format!("X{scale}")),
            scale,
        )
    }

    /// Scan an explicit pair of directories.
    ///
    /// Every supported image directly under `hr_dir` must have a
    /// ``{stem}x{scale}.{ext}`` counterpart under `lr_dir`.
    pub fn from_paired_dirs<P: AsRef<Path>>(
        hr_dir: P,
        lr_dir: P,
        scale: usize,
    ) -> Result<Self, SrDatasetError> {
        let hr_dir = hr_dir.as_ref();
        let lr_dir = lr_dir.as_ref();

        for dir in [hr_dir, lr_dir] {
            if !dir.is_dir() {
                return Err(SrDatasetError::DirectoryNotFound(dir.to_path_buf()));
            }
        }

        let walker = globwalk::GlobWalkerBuilder::from_patterns(
            hr_dir,
            &[format!("*.{{{}}}", SUPPORTED_FILES.join(","))],
        )
        .max_depth(1)
        .follow_links(true)
        .sort_by(|p1: &DirEntry, p2: &DirEntry| p1.path().cmp(p2.path()))
        .build()
        .map_err(|err| SrDatasetError::Scan(format!("{err:?}")))?
        .filter_map(Result::ok);

        let mut pairs = Vec::new();
        for entry in walker {
            let hr = entry.path().to_path_buf();
            let lr = lr_dir.join(lr_file_name(&hr, scale)?);
            if !lr.is_file() {
                return Err(SrDatasetError::MissingLowRes(lr));
            }
            pairs.push(SrImagePair { hr, lr, scale });
        }

        if pairs.is_empty() {
            return Err(SrDatasetError::NoImages(hr_dir.to_path_buf()));
        }

        Ok(Self { pairs })
    }

    /// The scanned pairs, in path order.
    pub fn pairs(&self) -> &[SrImagePair] {
        &self.pairs
    }
}

impl Dataset<SrImagePair> for SrFolderDataset {
    fn get(&self, index: usize) -> Option<SrImagePair> {
        self.pairs.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}
