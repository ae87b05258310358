//! Result types for the table extraction pipeline.

use crate::processors::geometry::OrientedBox;
use serde::{Deserialize, Serialize};

/// One reconstructed table entry, positioned by row and column.
///
/// All coordinates are in the original input image's coordinate system.
/// An empty `text` with an empty `indices` list marks a cell whose
/// recognition failed or whose geometry degenerated; the grid shape is
/// preserved regardless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    /// The cell's box in source-image coordinates.
    pub bbox: OrientedBox,
    /// Row index, top to bottom.
    pub row: usize,
    /// Column index within the row, left to right.
    pub col: usize,
    /// Decoded text for the cell.
    pub text: String,
    /// Raw decoded label-index sequence behind `text`.
    pub indices: Vec<usize>,
    /// Mean decode confidence, 0.0 for failed cells.
    pub confidence: f32,
}

impl GridCell {
    /// Returns true when the cell carries recognized text.
    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }
}

/// The row-major grid of recognized table text.
///
/// Rows are ordered top to bottom and cells within a row left to right,
/// matching visual reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableGrid {
    rows: Vec<Vec<GridCell>>,
}

impl TableGrid {
    /// Builds a grid from pre-ordered rows.
    pub fn new(rows: Vec<Vec<GridCell>>) -> Self {
        Self { rows }
    }

    /// The grid's rows in reading order.
    pub fn rows(&self) -> &[Vec<GridCell>] {
        &self.rows
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// The cell at (row, col), if present.
    pub fn cell(&self, row: usize, col: usize) -> Option<&GridCell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Returns true when the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }

    /// Extracts the text as plain rows of strings.
    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.text.clone()).collect())
            .collect()
    }

    /// Consumes the grid, yielding plain rows of strings.
    pub fn into_text_rows(self) -> Vec<Vec<String>> {
        self.rows
            .into_iter()
            .map(|row| row.into_iter().map(|cell| cell.text).collect())
            .collect()
    }
}
