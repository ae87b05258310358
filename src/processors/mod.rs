//! Post-processing stages of the extraction pipeline.
//!
//! Data flows strictly forward through these modules: the probability map is
//! segmented into regions, regions become oriented boxes, boxes are clustered
//! into a grid, and recognition output is decoded into text.

pub mod box_fit;
pub mod decode;
pub mod geometry;
pub mod grid;
pub mod region_extract;

pub use box_fit::{fit_boxes, sort_reading_order, BoxFitStrategy};
pub use decode::{blank_index, decode, resolve_layout, DecodedSequence, TensorLayout};
pub use geometry::{min_area_rect, OrientedBox, Point};
pub use grid::assemble;
pub use region_extract::{extract, ProbabilityMap, Region};
