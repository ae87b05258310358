//! Rotation-corrected cell cropping.
//!
//! Each grid cell is extracted as a raster buffer of the box's own size with
//! its rotation undone: the source is rotated about the box center so the
//! box becomes axis-aligned, then the target rectangle is copied out. Boxes
//! with no rotation take a direct rectangular copy, which is also the path
//! used when the axis-aligned fallback strategy is active.

use crate::core::errors::OcrError;
use crate::processors::geometry::OrientedBox;
use image::{imageops, Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate, Interpolation};

/// Angles below this are treated as unrotated.
const FLAT_ANGLE_EPSILON: f32 = 0.05;

/// Extracts a rotation-corrected crop for one box.
///
/// The output buffer is (round(w), round(h)); the extraction rectangle is
/// clamped to the image bounds, so a box hanging over the edge yields a
/// smaller buffer. Degenerate boxes and rectangles that clamp to nothing are
/// reported as errors for the caller to skip.
pub fn crop_oriented(image: &RgbImage, bx: &OrientedBox) -> Result<RgbImage, OcrError> {
    let width = bx.width.round() as i64;
    let height = bx.height.round() as i64;
    if bx.is_degenerate() || width <= 0 || height <= 0 {
        return Err(OcrError::invalid_input(format!(
            "degenerate crop box {}x{} at ({}, {})",
            bx.width, bx.height, bx.cx, bx.cy
        )));
    }

    if bx.angle.abs() < FLAT_ANGLE_EPSILON {
        return extract_centered_rect(image, bx.cx, bx.cy, width as u32, height as u32);
    }

    // Undoing a counter-clockwise box rotation means turning the image
    // clockwise by the same amount about the box center.
    let rotated = rotate(
        image,
        (bx.cx, bx.cy),
        bx.angle.to_radians(),
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
    );
    extract_centered_rect(&rotated, bx.cx, bx.cy, width as u32, height as u32)
}

/// Copies the axis-aligned rectangle of the given size centered at (cx, cy),
/// clamped to the image bounds.
fn extract_centered_rect(
    image: &RgbImage,
    cx: f32,
    cy: f32,
    width: u32,
    height: u32,
) -> Result<RgbImage, OcrError> {
    let x0 = (cx - width as f32 / 2.0).round().max(0.0) as u32;
    let y0 = (cy - height as f32 / 2.0).round().max(0.0) as u32;
    let x1 = (x0 + width).min(image.width());
    let y1 = (y0 + height).min(image.height());
    if x1 <= x0 || y1 <= y0 {
        return Err(OcrError::invalid_input(format!(
            "crop rectangle ({x0}, {y0})..({x1}, {y1}) is outside the image"
        )));
    }
    Ok(imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        let mut img = RgbImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                img.put_pixel(x, y, Rgb([(x % 256) as u8, (y % 256) as u8, 0]));
            }
        }
        img
    }

    #[test]
    fn test_flat_box_is_copied_exactly() {
        let img = gradient_image(100, 80);
        let bx = OrientedBox::new(50.0, 40.0, 20.0, 10.0, 0.0);
        let crop = crop_oriented(&img, &bx).unwrap();
        assert_eq!(crop.dimensions(), (20, 10));
        // Top-left of the crop is (40, 35) in the source.
        assert_eq!(crop.get_pixel(0, 0), img.get_pixel(40, 35));
        assert_eq!(crop.get_pixel(19, 9), img.get_pixel(59, 44));
    }

    #[test]
    fn test_crop_clamps_at_image_border() {
        let img = gradient_image(50, 50);
        let bx = OrientedBox::new(45.0, 45.0, 20.0, 20.0, 0.0);
        let crop = crop_oriented(&img, &bx).unwrap();
        // 10 pixels fall outside on each axis.
        assert_eq!(crop.dimensions(), (15, 15));
    }

    #[test]
    fn test_degenerate_box_is_an_error() {
        let img = gradient_image(50, 50);
        let bx = OrientedBox::new(10.0, 10.0, 0.0, 5.0, 0.0);
        assert!(crop_oriented(&img, &bx).is_err());
    }

    #[test]
    fn test_box_entirely_outside_is_an_error() {
        let img = gradient_image(50, 50);
        let bx = OrientedBox::new(500.0, 500.0, 10.0, 10.0, 0.0);
        assert!(crop_oriented(&img, &bx).is_err());
    }

    #[test]
    fn test_rotated_crop_has_target_size_and_content() {
        // Uniform image: any interior rotated crop stays uniform, whatever
        // the rotation direction.
        let img = RgbImage::from_pixel(200, 200, Rgb([200, 40, 40]));
        let bx = OrientedBox::new(100.0, 100.0, 40.0, 16.0, 30.0);
        let crop = crop_oriented(&img, &bx).unwrap();
        assert_eq!(crop.dimensions(), (40, 16));
        let center = crop.get_pixel(20, 8);
        assert_eq!(center, &Rgb([200, 40, 40]));
    }

    #[test]
    fn test_near_zero_angle_takes_the_flat_path() {
        let img = gradient_image(100, 80);
        let flat = OrientedBox::new(50.0, 40.0, 20.0, 10.0, 0.0);
        let nearly = OrientedBox::new(50.0, 40.0, 20.0, 10.0, 0.01);
        assert_eq!(
            crop_oriented(&img, &flat).unwrap(),
            crop_oriented(&img, &nearly).unwrap()
        );
    }
}
