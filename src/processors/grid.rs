//! Row/column grid reconstruction from detected boxes.
//!
//! Detected boxes are clustered into table rows by vertical center, then
//! adjacent boxes within a row are merged into single cells when the gap
//! between them is small (two words of one field). The reconstruction is
//! best-effort rather than geometrically exact.

use crate::processors::geometry::OrientedBox;

/// One row under construction.
///
/// The anchor is the center of the first box assigned to the row; later
/// boxes join by distance to this anchor. Assignment is first-match in a
/// single top-to-bottom, left-to-right pass, so the partition depends only
/// on input order and is reproducible run to run.
struct RowBucket {
    anchor_cy: f32,
    boxes: Vec<OrientedBox>,
}

/// Clusters boxes into rows and merges near-adjacent boxes within each row.
///
/// The outer vector is rows top-to-bottom; each inner vector is cells left
/// to right. `row_tolerance` is the vertical distance within which a box
/// joins an existing row; `col_tolerance` is the largest horizontal gap
/// still merged into a single cell.
///
/// Input order matters: boxes must arrive sorted in reading order (the box
/// fitter guarantees this) for the first-match row assignment to reproduce
/// the reference partition.
pub fn assemble(
    boxes: &[OrientedBox],
    row_tolerance: f32,
    col_tolerance: f32,
) -> Vec<Vec<OrientedBox>> {
    let mut rows: Vec<RowBucket> = Vec::new();

    for bx in boxes {
        match rows
            .iter_mut()
            .find(|row| (bx.cy - row.anchor_cy).abs() <= row_tolerance)
        {
            Some(row) => row.boxes.push(*bx),
            None => rows.push(RowBucket {
                anchor_cy: bx.cy,
                boxes: vec![*bx],
            }),
        }
    }

    rows.sort_by(|a, b| {
        a.anchor_cy
            .partial_cmp(&b.anchor_cy)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let assembled: Vec<Vec<OrientedBox>> = rows
        .into_iter()
        .map(|row| merge_row_cells(row.boxes, col_tolerance))
        .collect();

    tracing::debug!(
        target: "postprocess",
        row_tolerance,
        col_tolerance,
        box_count = boxes.len(),
        row_count = assembled.len(),
        "Assembled grid rows"
    );

    assembled
}

/// Sorts a row's boxes by left edge and merges boxes separated by at most
/// `col_tolerance`.
fn merge_row_cells(mut boxes: Vec<OrientedBox>, col_tolerance: f32) -> Vec<OrientedBox> {
    boxes.sort_by(|a, b| {
        a.x_min()
            .partial_cmp(&b.x_min())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut cells: Vec<OrientedBox> = Vec::with_capacity(boxes.len());
    for bx in boxes {
        match cells.last_mut() {
            Some(prev) if bx.x_min() - prev.x_max() <= col_tolerance => {
                *prev = merge_pair(prev, &bx);
            }
            _ => cells.push(bx),
        }
    }
    cells
}

/// Merges two boxes of one cell: union of bounding extents, averaged
/// centers. The angle carries over only when both parts agree; mixed
/// orientations flatten to zero.
fn merge_pair(a: &OrientedBox, b: &OrientedBox) -> OrientedBox {
    let x_min = a.x_min().min(b.x_min());
    let x_max = a.x_max().max(b.x_max());
    let y_min = a.y_min().min(b.y_min());
    let y_max = a.y_max().max(b.y_max());
    OrientedBox {
        cx: (a.cx + b.cx) / 2.0,
        cy: (a.cy + b.cy) / 2.0,
        width: x_max - x_min,
        height: y_max - y_min,
        angle: if a.angle == b.angle { a.angle } else { 0.0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(cx: f32, cy: f32, w: f32, h: f32) -> OrientedBox {
        OrientedBox::new(cx, cy, w, h, 0.0)
    }

    #[test]
    fn test_two_by_three_grid() {
        let boxes = vec![
            flat(50.0, 100.0, 40.0, 12.0),
            flat(250.0, 102.0, 40.0, 12.0),
            flat(450.0, 99.0, 40.0, 12.0),
            flat(50.0, 200.0, 40.0, 12.0),
            flat(250.0, 201.0, 40.0, 12.0),
            flat(450.0, 200.0, 40.0, 12.0),
        ];
        let grid = assemble(&boxes, 8.0, 5.0);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0].len(), 3);
        assert_eq!(grid[1].len(), 3);
        // Reading order within rows.
        assert!(grid[0][0].cx < grid[0][1].cx);
        assert!(grid[0][1].cx < grid[0][2].cx);
        // Rows top to bottom.
        assert!(grid[0][0].cy < grid[1][0].cy);
    }

    #[test]
    fn test_adjacent_words_merge_into_one_cell() {
        // Two words of one field: gap of 4 between right and left edges.
        let a = flat(50.0, 10.0, 40.0, 10.0); // spans 30..70
        let b = flat(94.0, 10.0, 40.0, 10.0); // spans 74..114
        let grid = assemble(&[a, b], 5.0, 5.0);
        assert_eq!(grid.len(), 1);
        assert_eq!(grid[0].len(), 1);
        let merged = grid[0][0];
        assert!((merged.width - 84.0).abs() < 1e-3, "width: {}", merged.width);
        assert!((merged.cx - 72.0).abs() < 1e-3, "cx: {}", merged.cx);
        assert_eq!(merged.angle, 0.0);
    }

    #[test]
    fn test_gap_beyond_tolerance_stays_two_cells() {
        let a = flat(50.0, 10.0, 40.0, 10.0); // spans 30..70
        let b = flat(120.0, 10.0, 40.0, 10.0); // spans 100..140, gap 30
        let grid = assemble(&[a, b], 5.0, 5.0);
        assert_eq!(grid[0].len(), 2);
    }

    #[test]
    fn test_chained_merges_collapse_a_whole_run() {
        let boxes = vec![
            flat(20.0, 10.0, 20.0, 10.0), // 10..30
            flat(44.0, 10.0, 20.0, 10.0), // 34..54, gap 4
            flat(68.0, 10.0, 20.0, 10.0), // 58..78, gap 4
        ];
        let grid = assemble(&boxes, 5.0, 5.0);
        assert_eq!(grid[0].len(), 1);
        assert!((grid[0][0].width - 68.0).abs() < 1e-3);
    }

    #[test]
    fn test_first_match_row_assignment_follows_input_order() {
        // Centers at 0, 9 and 18 with tolerance 10: the middle box joins the
        // first row (anchor 0), and 18 is beyond the anchor even though it is
        // within 10 of the middle box. First-match, not nearest-center.
        let boxes = vec![
            flat(10.0, 0.0, 8.0, 4.0),
            flat(30.0, 9.0, 8.0, 4.0),
            flat(50.0, 18.0, 8.0, 4.0),
        ];
        let grid = assemble(&boxes, 10.0, 2.0);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0].len(), 2);
        assert_eq!(grid[1].len(), 1);
        assert!((grid[1][0].cy - 18.0).abs() < 1e-4);
    }

    #[test]
    fn test_assembly_is_order_stable() {
        let boxes = vec![
            flat(50.0, 100.0, 40.0, 12.0),
            flat(250.0, 104.0, 40.0, 12.0),
            flat(50.0, 200.0, 40.0, 12.0),
            flat(250.0, 196.0, 40.0, 12.0),
        ];
        let first = assemble(&boxes, 8.0, 5.0);
        for _ in 0..10 {
            assert_eq!(assemble(&boxes, 8.0, 5.0), first);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(assemble(&[], 8.0, 5.0).is_empty());
    }
}
