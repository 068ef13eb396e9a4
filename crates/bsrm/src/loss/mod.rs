//! Training losses.
pub mod gradient;
pub mod super_resolution;
