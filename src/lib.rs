//! Building blocks for training pipelines of data-transforming stages
//! over labeled sample collections.
/// Tracing subscriber setup.
pub mod logging;
/// Labeled multi-part samples and collections.
pub mod sample;
/// Stratified downsampling of labeled collections.
pub mod selection;
/// Stage trait, composers, and the shared stage registry.
pub mod stage;
