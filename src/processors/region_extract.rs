//! Connected-component extraction from detection probability maps.
//!
//! The detection model outputs a per-pixel text probability map in model
//! input space. This module binarizes the map and labels its 4-connected
//! foreground components, which the box fitter then turns into oriented
//! boxes.

use crate::core::Tensor2D;
use crate::utils::transform::LetterboxTransform;
use std::collections::VecDeque;

/// A per-pixel text probability map plus the letterbox transform that maps
/// the source image into model input space.
///
/// Immutable once produced by the detection engine.
#[derive(Debug, Clone)]
pub struct ProbabilityMap {
    data: Tensor2D,
    transform: LetterboxTransform,
}

impl ProbabilityMap {
    /// Creates a map from a H×W probability tensor and its transform.
    pub fn new(data: Tensor2D, transform: LetterboxTransform) -> Self {
        Self { data, transform }
    }

    /// Map height in cells.
    pub fn height(&self) -> usize {
        self.data.shape()[0]
    }

    /// Map width in cells.
    pub fn width(&self) -> usize {
        self.data.shape()[1]
    }

    /// Probability value at (x, y).
    #[inline]
    pub fn value(&self, x: usize, y: usize) -> f32 {
        self.data[[y, x]]
    }

    /// The letterbox transform carried alongside the map.
    pub fn transform(&self) -> &LetterboxTransform {
        &self.transform
    }
}

/// A maximal 4-connected set of foreground map cells.
///
/// Created by [`extract`], consumed immediately by the box fitter; not
/// retained afterwards.
#[derive(Debug, Clone)]
pub struct Region {
    /// Number of cells in the component.
    pub area: usize,
    /// Minimum x over the component's cells.
    pub min_x: u32,
    /// Minimum y over the component's cells.
    pub min_y: u32,
    /// Maximum x over the component's cells.
    pub max_x: u32,
    /// Maximum y over the component's cells.
    pub max_y: u32,
    /// The component's cells, in discovery order.
    pub cells: Vec<(u32, u32)>,
}

impl Region {
    /// Extent width in cells.
    pub fn extent_width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    /// Extent height in cells.
    pub fn extent_height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// Extracts the foreground connected components of a probability map.
///
/// A cell is foreground when its value is at least `threshold`. Components
/// are discovered with an iterative, explicit-queue flood fill (never
/// recursion, so stack depth stays constant regardless of image area); the
/// extent is tracked during the fill, avoiding a second pass. Components
/// smaller than `min_area` cells are discarded as sensor or compression
/// noise.
///
/// Each cell belongs to at most one component, and discovery order is
/// row-major, so results are deterministic.
pub fn extract(map: &ProbabilityMap, threshold: f32, min_area: usize) -> Vec<Region> {
    let height = map.height();
    let width = map.width();
    if height == 0 || width == 0 {
        return Vec::new();
    }

    let mut visited = vec![false; height * width];
    let mut regions = Vec::new();
    let mut queue: VecDeque<(u32, u32)> = VecDeque::new();

    for y in 0..height {
        for x in 0..width {
            if visited[y * width + x] || map.value(x, y) < threshold {
                continue;
            }

            visited[y * width + x] = true;
            queue.push_back((x as u32, y as u32));

            let mut cells = Vec::new();
            let (mut min_x, mut min_y) = (x as u32, y as u32);
            let (mut max_x, mut max_y) = (x as u32, y as u32);

            while let Some((cx, cy)) = queue.pop_front() {
                cells.push((cx, cy));
                min_x = min_x.min(cx);
                min_y = min_y.min(cy);
                max_x = max_x.max(cx);
                max_y = max_y.max(cy);

                let mut try_visit = |nx: i64, ny: i64, queue: &mut VecDeque<(u32, u32)>| {
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        return;
                    }
                    let (nx, ny) = (nx as usize, ny as usize);
                    if !visited[ny * width + nx] && map.value(nx, ny) >= threshold {
                        visited[ny * width + nx] = true;
                        queue.push_back((nx as u32, ny as u32));
                    }
                };

                try_visit(cx as i64 - 1, cy as i64, &mut queue);
                try_visit(cx as i64 + 1, cy as i64, &mut queue);
                try_visit(cx as i64, cy as i64 - 1, &mut queue);
                try_visit(cx as i64, cy as i64 + 1, &mut queue);
            }

            if cells.len() >= min_area {
                regions.push(Region {
                    area: cells.len(),
                    min_x,
                    min_y,
                    max_x,
                    max_y,
                    cells,
                });
            }
        }
    }

    tracing::debug!(
        target: "postprocess",
        map_size = ?(width, height),
        threshold,
        min_area,
        region_count = regions.len(),
        "Extracted foreground components"
    );

    regions
}
