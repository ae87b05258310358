//! Oriented box fitting over extracted regions.
//!
//! Each region becomes one oriented box: either its minimum-area rectangle
//! (the preferred strategy) or its axis-aligned bounding rectangle (the
//! dependency-free fallback). Fitted boxes are unclipped, filtered for
//! degenerate slivers, and sorted into reading order.

use crate::processors::geometry::{min_area_rect, OrientedBox, Point};
use crate::processors::region_extract::Region;
use serde::{Deserialize, Serialize};

/// Vertical distance (model-space units) within which two box centers are
/// treated as the same visual row while sorting. Sort-only; the grid
/// assembler owns the final row grouping.
const ROW_TIE_TOLERANCE: f32 = 10.0;

/// Strategy for fitting a box to a region, resolved once at pipeline start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxFitStrategy {
    /// Minimum-area rotated rectangle over the region's cells.
    #[default]
    Rotated,
    /// Axis-aligned bounding rectangle, angle 0. Always available.
    AxisAligned,
}

/// Fits one oriented box per region, then unclips, filters and sorts.
///
/// Boxes whose shorter side ends up below `min_size` are discarded as
/// spurious slivers. The result is sorted top-to-bottom then left-to-right
/// by box center.
pub fn fit_boxes(
    regions: &[Region],
    strategy: BoxFitStrategy,
    unclip_ratio: f32,
    min_size: f32,
) -> Vec<OrientedBox> {
    let mut boxes: Vec<OrientedBox> = regions
        .iter()
        .filter_map(|region| {
            let fitted = match strategy {
                BoxFitStrategy::AxisAligned => axis_aligned_box(region),
                BoxFitStrategy::Rotated => rotated_box(region),
            };
            if fitted.is_degenerate() {
                return None;
            }
            let expanded = fitted.unclip(unclip_ratio);
            if expanded.min_side() < min_size {
                None
            } else {
                Some(expanded)
            }
        })
        .collect();

    sort_reading_order(&mut boxes);

    tracing::debug!(
        target: "postprocess",
        strategy = ?strategy,
        unclip_ratio,
        region_count = regions.len(),
        box_count = boxes.len(),
        "Fitted region boxes"
    );

    boxes
}

/// Axis-aligned bounding rectangle of a region's cell extent.
fn axis_aligned_box(region: &Region) -> OrientedBox {
    OrientedBox::axis_aligned(
        region.min_x as f32,
        region.min_y as f32,
        region.max_x as f32 + 1.0,
        region.max_y as f32 + 1.0,
    )
}

/// Minimum-area rectangle over the region's cell centers.
fn rotated_box(region: &Region) -> OrientedBox {
    let points: Vec<Point> = region
        .cells
        .iter()
        .map(|&(x, y)| Point::new(x as f32, y as f32))
        .collect();
    min_area_rect(&points)
}

/// Sorts boxes top-to-bottom then left-to-right by center.
///
/// After the primary sort, adjacent boxes whose vertical centers lie within
/// [`ROW_TIE_TOLERANCE`] are reordered by horizontal center so boxes on the
/// same visual row read left to right.
pub fn sort_reading_order(boxes: &mut [OrientedBox]) {
    boxes.sort_by(|a, b| {
        (a.cy, a.cx)
            .partial_cmp(&(b.cy, b.cx))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let n = boxes.len();
    for i in 0..n.saturating_sub(1) {
        for j in (0..=i).rev() {
            if j + 1 >= boxes.len() {
                break;
            }
            let same_row = (boxes[j + 1].cy - boxes[j].cy).abs() <= ROW_TIE_TOLERANCE;
            if same_row && boxes[j + 1].cx < boxes[j].cx {
                boxes.swap(j, j + 1);
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_region(x0: u32, y0: u32, w: u32, h: u32) -> Region {
        let mut cells = Vec::new();
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                cells.push((x, y));
            }
        }
        Region {
            area: cells.len(),
            min_x: x0,
            min_y: y0,
            max_x: x0 + w - 1,
            max_y: y0 + h - 1,
            cells,
        }
    }

    #[test]
    fn test_axis_aligned_fit_covers_extent() {
        let region = rect_region(10, 20, 30, 8);
        let boxes = fit_boxes(&[region], BoxFitStrategy::AxisAligned, 1.0, 1.0);
        assert_eq!(boxes.len(), 1);
        let bx = boxes[0];
        assert_eq!(bx.angle, 0.0);
        assert!((bx.width - 30.0).abs() < 1e-4);
        assert!((bx.height - 8.0).abs() < 1e-4);
        assert!((bx.cx - 25.0).abs() < 1e-4);
        assert!((bx.cy - 24.0).abs() < 1e-4);
    }

    #[test]
    fn test_rotated_fit_on_axis_aligned_blob_is_near_flat() {
        let region = rect_region(0, 0, 20, 6);
        let boxes = fit_boxes(&[region], BoxFitStrategy::Rotated, 1.0, 1.0);
        assert_eq!(boxes.len(), 1);
        let bx = boxes[0];
        // Cell centers span one less than the cell extent.
        assert!((bx.width - 19.0).abs() < 0.5, "width: {}", bx.width);
        assert!((bx.height - 5.0).abs() < 0.5, "height: {}", bx.height);
        assert!(bx.angle.abs() < 1.0, "angle: {}", bx.angle);
    }

    #[test]
    fn test_unclip_ratio_above_one_strictly_grows_every_box() {
        let regions = vec![rect_region(0, 0, 12, 5), rect_region(30, 0, 8, 8)];
        let plain = fit_boxes(&regions, BoxFitStrategy::AxisAligned, 1.0, 1.0);
        let grown = fit_boxes(&regions, BoxFitStrategy::AxisAligned, 1.6, 1.0);
        assert_eq!(plain.len(), grown.len());
        for (p, g) in plain.iter().zip(&grown) {
            assert!(g.width > p.width);
            assert!(g.height > p.height);
        }
    }

    #[test]
    fn test_min_size_filters_slivers() {
        let regions = vec![rect_region(0, 0, 40, 2), rect_region(0, 20, 40, 10)];
        let boxes = fit_boxes(&regions, BoxFitStrategy::AxisAligned, 1.0, 3.0);
        assert_eq!(boxes.len(), 1);
        assert!((boxes[0].cy - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_reading_order_with_vertical_jitter() {
        // Two visual rows; centers within the second row differ by a few
        // units vertically but must still read left to right.
        let mut boxes = vec![
            OrientedBox::new(300.0, 104.0, 40.0, 10.0, 0.0),
            OrientedBox::new(100.0, 100.0, 40.0, 10.0, 0.0),
            OrientedBox::new(200.0, 208.0, 40.0, 10.0, 0.0),
            OrientedBox::new(100.0, 212.0, 40.0, 10.0, 0.0),
        ];
        sort_reading_order(&mut boxes);
        let centers: Vec<(f32, f32)> = boxes.iter().map(|b| (b.cx, b.cy)).collect();
        assert_eq!(
            centers,
            vec![
                (100.0, 100.0),
                (300.0, 104.0),
                (100.0, 212.0),
                (200.0, 208.0),
            ]
        );
    }

    #[test]
    fn test_boxes_beyond_tie_tolerance_keep_vertical_order() {
        let mut boxes = vec![
            OrientedBox::new(10.0, 50.0, 8.0, 8.0, 0.0),
            OrientedBox::new(90.0, 20.0, 8.0, 8.0, 0.0),
        ];
        sort_reading_order(&mut boxes);
        assert!((boxes[0].cy - 20.0).abs() < 1e-4);
        assert!((boxes[1].cy - 50.0).abs() < 1e-4);
    }
}
