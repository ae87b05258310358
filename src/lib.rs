//! # tabular-ocr
//!
//! Table text extraction from photographed documents.
//!
//! Given a raster image, an opaque detection model producing a per-pixel
//! text-probability map, and an opaque recognition model mapping glyph
//! strips to label-index sequences, the pipeline:
//!
//! 1. extracts connected regions from the probability map,
//! 2. fits oriented boxes with an axis-aligned fallback,
//! 3. maps boxes back into source image coordinates,
//! 4. clusters them into table rows and columns,
//! 5. crops each cell with rotation correction, and
//! 6. decodes the recognition output (greedy CTC) into a row-major grid of
//!    strings.
//!
//! Models are reached only through the [`core::inference::InferenceEngine`]
//! boundary; the crate never loads or runs models itself.
//!
//! ## Modules
//!
//! * [`core`] - Errors, configuration and the inference boundary
//! * [`processors`] - Region extraction, box fitting, grid assembly, decoding
//! * [`tableocr`] - The pipeline orchestrator and result types
//! * [`utils`] - Cropping, dictionary loading, letterbox transform, logging

pub mod core;
pub mod processors;
pub mod tableocr;
pub mod utils;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{
        InferenceEngine, NamedTensors, OcrError, OcrResult, PipelineConfig, Tensor4D,
    };
    pub use crate::processors::{BoxFitStrategy, OrientedBox};
    pub use crate::tableocr::{GridCell, TableGrid, TableOcr, TableOcrBuilder};
    pub use crate::utils::{Dictionary, LetterboxTransform};
}
