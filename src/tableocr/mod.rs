//! The table extraction pipeline module.
//!
//! [`TableOcrBuilder`] wires detection and recognition engines, an optional
//! orientation classifier, and a label dictionary into a [`TableOcr`]
//! pipeline producing a [`TableGrid`] per image.

pub mod pipeline;
pub mod result;

pub use pipeline::{TableOcr, TableOcrBuilder};
pub use result::{GridCell, TableGrid};
