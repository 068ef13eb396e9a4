//! Reusable neural network modules for super-resolution trunks.
pub mod activation;
pub mod blocks;
pub mod color;
pub mod norm;
pub mod upsample;
