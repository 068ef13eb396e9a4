//! Paired image datasets and batching.
pub mod batcher;
pub mod pairs;
