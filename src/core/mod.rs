//! Core building blocks of the extraction pipeline.
//!
//! This module contains:
//! - Configuration management
//! - Error handling
//! - The inference boundary (opaque model engines and tensor types)
//!
//! It also re-exports the commonly used types for convenience.

pub mod config;
pub mod errors;
pub mod inference;

pub use config::{
    DetectionConfig, GridConfig, ParallelPolicy, PipelineConfig, RecognitionConfig,
};
pub use errors::{OcrError, OcrResult};
pub use inference::{
    InferenceEngine, NamedTensors, Tensor2D, Tensor3D, Tensor4D, squeeze_to_2d,
};
