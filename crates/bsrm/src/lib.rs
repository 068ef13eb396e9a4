#![warn(missing_docs)]
//!# bsrm - Burn Super-Resolution Models
//!
//! ## Notable Components
//!
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::color`] - frozen mean-shift color normalization.
//!   * [`layers::blocks`] - trunk building blocks.
//!     * [`layers::blocks::conv_block`] - conv / norm / activation block.
//!     * [`layers::blocks::residual`] - scaled residual block.
//!     * [`layers::blocks::dense`] - dense layers and residual dense blocks.
//!   * [`layers::upsample`] - pixel shuffle and sub-pixel upsamplers.
//! * [`loss`] - training losses.
//!   * [`loss::gradient`] - Sobel edge-magnitude loss.
//!   * [`loss::super_resolution`] - combined pixel + edge loss.
//! * [`models`] - complete model families.
//!   * [`models::edsr`] - EDSR residual network.
//!   * [`models::rdn`] - RDN residual dense network.
//! * [`data`] - paired HR/LR dataset scanning and batching.

pub mod layers;

pub mod data;
pub mod loss;
pub mod models;
