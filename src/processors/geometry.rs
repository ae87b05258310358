//! Geometric primitives for detection post-processing.
//!
//! This module provides the point and oriented-box types used throughout the
//! pipeline, along with the minimum-area-rectangle fit (convex hull plus
//! rotating calipers) that backs the rotated box fitting strategy.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    /// Creates a new point with the given coordinates.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An oriented rectangle described by center, size and rotation.
///
/// The angle is in degrees, positive meaning counter-clockwise on screen
/// (the image y axis points down). All coordinates of one box live in a
/// single space, model or source; coordinate-space transitions always
/// produce a new value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientedBox {
    /// X-coordinate of the box center.
    pub cx: f32,
    /// Y-coordinate of the box center.
    pub cy: f32,
    /// Width of the box.
    pub width: f32,
    /// Height of the box.
    pub height: f32,
    /// Rotation in degrees, positive = counter-clockwise.
    pub angle: f32,
}

impl OrientedBox {
    /// Creates a new oriented box.
    pub fn new(cx: f32, cy: f32, width: f32, height: f32, angle: f32) -> Self {
        Self {
            cx,
            cy,
            width,
            height,
            angle,
        }
    }

    /// Creates an axis-aligned box from extent coordinates.
    pub fn axis_aligned(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            cx: (x_min + x_max) / 2.0,
            cy: (y_min + y_max) / 2.0,
            width: x_max - x_min,
            height: y_max - y_min,
            angle: 0.0,
        }
    }

    /// Direction of the width axis for this box's rotation.
    #[inline]
    fn width_axis(&self) -> (f32, f32) {
        let rad = self.angle * PI / 180.0;
        (rad.cos(), -rad.sin())
    }

    /// Returns the four corner points.
    pub fn corners(&self) -> [Point; 4] {
        let (ux, uy) = self.width_axis();
        // Height axis is the width axis rotated a quarter turn.
        let (vx, vy) = (-uy, ux);
        let (hw, hh) = (self.width / 2.0, self.height / 2.0);
        let corner = |sx: f32, sy: f32| {
            Point::new(
                self.cx + sx * hw * ux + sy * hh * vx,
                self.cy + sx * hw * uy + sy * hh * vy,
            )
        };
        [
            corner(-1.0, -1.0),
            corner(1.0, -1.0),
            corner(1.0, 1.0),
            corner(-1.0, 1.0),
        ]
    }

    /// Minimum x over the box corners.
    pub fn x_min(&self) -> f32 {
        self.corners()
            .iter()
            .map(|p| p.x)
            .fold(f32::INFINITY, f32::min)
    }

    /// Maximum x over the box corners.
    pub fn x_max(&self) -> f32 {
        self.corners()
            .iter()
            .map(|p| p.x)
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Minimum y over the box corners.
    pub fn y_min(&self) -> f32 {
        self.corners()
            .iter()
            .map(|p| p.y)
            .fold(f32::INFINITY, f32::min)
    }

    /// Maximum y over the box corners.
    pub fn y_max(&self) -> f32 {
        self.corners()
            .iter()
            .map(|p| p.y)
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Length of the shorter side.
    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }

    /// Returns true when the box cannot describe a usable region.
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0
            && self.height > 0.0
            && self.width.is_finite()
            && self.height.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite())
    }

    /// Expands the box to compensate for the detector's tendency to
    /// under-cover the true glyph extent.
    ///
    /// Both sides grow by `sqrt(w * h) * (ratio - 1)`; a ratio of 1 leaves
    /// the box unchanged.
    pub fn unclip(&self, ratio: f32) -> Self {
        let delta = (self.width * self.height).sqrt() * (ratio - 1.0);
        Self {
            width: self.width + delta,
            height: self.height + delta,
            ..*self
        }
    }
}

/// Computes the cross product orientation of three points.
fn cross(p1: &Point, p2: &Point, p3: &Point) -> f32 {
    (p2.x - p1.x) * (p3.y - p1.y) - (p2.y - p1.y) * (p3.x - p1.x)
}

/// Computes the convex hull of a point set using Graham's scan.
fn convex_hull(points: &[Point]) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut points = points.to_vec();

    // Start from the lowest point, leftmost on ties.
    let mut start_idx = 0;
    for i in 1..points.len() {
        if points[i].y < points[start_idx].y
            || (points[i].y == points[start_idx].y && points[i].x < points[start_idx].x)
        {
            start_idx = i;
        }
    }
    points.swap(0, start_idx);
    let start = points[0];

    points[1..].sort_by(|a, b| {
        let c = cross(&start, a, b);
        if c == 0.0 {
            let da = (a.x - start.x).powi(2) + (a.y - start.y).powi(2);
            let db = (b.x - start.x).powi(2) + (b.y - start.y).powi(2);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        } else if c > 0.0 {
            std::cmp::Ordering::Less
        } else {
            std::cmp::Ordering::Greater
        }
    });

    let mut hull: Vec<Point> = Vec::with_capacity(points.len());
    for point in points {
        while hull.len() > 1 && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], &point) <= 0.0 {
            hull.pop();
        }
        hull.push(point);
    }
    hull
}

/// Axis-aligned fallback for degenerate point sets.
fn extent_box(points: &[Point]) -> OrientedBox {
    let Some((min_x, max_x)) = points.iter().map(|p| p.x).minmax().into_option() else {
        return OrientedBox::new(0.0, 0.0, 0.0, 0.0, 0.0);
    };
    let Some((min_y, max_y)) = points.iter().map(|p| p.y).minmax().into_option() else {
        return OrientedBox::new(0.0, 0.0, 0.0, 0.0, 0.0);
    };
    OrientedBox::axis_aligned(min_x, min_y, max_x, max_y)
}

/// Computes the minimum-area oriented rectangle enclosing a point set.
///
/// Runs rotating calipers over the convex hull. Point sets whose hull
/// degenerates to a segment or a single point fall back to the axis-aligned
/// extent. The returned angle is normalized into [-45, 45] degrees with the
/// width/height sides swapped accordingly, so `width` is always the side
/// closer to horizontal.
pub fn min_area_rect(points: &[Point]) -> OrientedBox {
    if points.len() < 3 {
        return extent_box(points);
    }

    let hull = convex_hull(points);
    if hull.len() < 3 {
        return extent_box(points);
    }

    let mut best_area = f32::MAX;
    let mut best = extent_box(points);

    let n = hull.len();
    for i in 0..n {
        let j = (i + 1) % n;
        let edge_x = hull[j].x - hull[i].x;
        let edge_y = hull[j].y - hull[i].y;
        let edge_len = (edge_x * edge_x + edge_y * edge_y).sqrt();
        if edge_len < f32::EPSILON {
            continue;
        }

        let nx = edge_x / edge_len;
        let ny = edge_y / edge_len;
        let px = -ny;
        let py = nx;

        let mut min_n = f32::MAX;
        let mut max_n = f32::MIN;
        let mut min_p = f32::MAX;
        let mut max_p = f32::MIN;
        for point in &hull {
            let proj_n = nx * (point.x - hull[i].x) + ny * (point.y - hull[i].y);
            min_n = min_n.min(proj_n);
            max_n = max_n.max(proj_n);
            let proj_p = px * (point.x - hull[i].x) + py * (point.y - hull[i].y);
            min_p = min_p.min(proj_p);
            max_p = max_p.max(proj_p);
        }

        let width = max_n - min_n;
        let height = max_p - min_p;
        let area = width * height;
        if area < best_area {
            best_area = area;

            let center_n = (min_n + max_n) / 2.0;
            let center_p = (min_p + max_p) / 2.0;
            let cx = hull[i].x + center_n * nx + center_p * px;
            let cy = hull[i].y + center_n * ny + center_p * py;

            // atan2 measures clockwise in image coordinates; negate for the
            // counter-clockwise-positive convention.
            let angle = -f32::atan2(ny, nx) * 180.0 / PI;
            best = normalize_orientation(OrientedBox::new(cx, cy, width, height, angle));
        }
    }

    best
}

/// Brings a box's angle into [-45, 45] degrees, swapping sides as needed.
///
/// A rectangle is invariant under 180-degree rotation and under quarter-turn
/// rotation with swapped sides, so this loses no information.
fn normalize_orientation(mut bx: OrientedBox) -> OrientedBox {
    while bx.angle > 90.0 {
        bx.angle -= 180.0;
    }
    while bx.angle <= -90.0 {
        bx.angle += 180.0;
    }
    if bx.angle > 45.0 {
        bx.angle -= 90.0;
        std::mem::swap(&mut bx.width, &mut bx.height);
    } else if bx.angle < -45.0 {
        bx.angle += 90.0;
        std::mem::swap(&mut bx.width, &mut bx.height);
    }
    bx
}
