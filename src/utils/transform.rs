//! Letterbox preprocessing and its coordinate inverse.
//!
//! The source image is mapped into the square detection input with a uniform
//! scale plus centering offsets. [`LetterboxTransform`] records that mapping
//! so detection boxes can be expressed back in source-image pixels, and the
//! tensor helpers build the normalized NCHW inputs both models consume.

use crate::core::errors::OcrError;
use crate::core::Tensor4D;
use crate::processors::geometry::OrientedBox;
use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};

/// The uniform-scale-plus-padding mapping from source image to model input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LetterboxTransform {
    /// Horizontal padding offset in model-input pixels.
    pub offset_x: f32,
    /// Vertical padding offset in model-input pixels.
    pub offset_y: f32,
    /// Uniform scale factor from source to model input.
    pub scale: f32,
}

impl LetterboxTransform {
    /// Creates a transform, validating the scale.
    pub fn new(offset_x: f32, offset_y: f32, scale: f32) -> Result<Self, OcrError> {
        if !(scale > 0.0 && scale.is_finite()) {
            return Err(OcrError::invalid_input(format!(
                "letterbox scale must be positive and finite, got {scale}"
            )));
        }
        Ok(Self {
            offset_x,
            offset_y,
            scale,
        })
    }

    /// The identity mapping (no offset, unit scale).
    pub fn identity() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale: 1.0,
        }
    }

    /// Expresses a source-space box in model input space.
    pub fn to_model_space(&self, bx: &OrientedBox) -> OrientedBox {
        OrientedBox {
            cx: bx.cx * self.scale + self.offset_x,
            cy: bx.cy * self.scale + self.offset_y,
            width: bx.width * self.scale,
            height: bx.height * self.scale,
            angle: bx.angle,
        }
    }

    /// Expresses a model-space box in source image space.
    ///
    /// The inverse affine is exact; only the final coordinates are rounded
    /// to the nearest source pixel and clamped to be non-negative. The angle
    /// is invariant under uniform scaling and translation.
    pub fn to_source_space(&self, bx: &OrientedBox) -> OrientedBox {
        OrientedBox {
            cx: ((bx.cx - self.offset_x) / self.scale).round().max(0.0),
            cy: ((bx.cy - self.offset_y) / self.scale).round().max(0.0),
            width: (bx.width / self.scale).round().max(0.0),
            height: (bx.height / self.scale).round().max(0.0),
            angle: bx.angle,
        }
    }
}

/// Letterboxes an image into a square model input tensor.
///
/// The image is scaled uniformly to fit `target`, centered on a black
/// canvas, and normalized to [0, 1] in NCHW layout. Returns the tensor and
/// the transform that maps source coordinates into the canvas.
pub fn letterbox_to_tensor(
    image: &RgbImage,
    target: u32,
) -> Result<(Tensor4D, LetterboxTransform), OcrError> {
    let (src_w, src_h) = image.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(OcrError::invalid_input("input image has a zero dimension"));
    }
    if target == 0 {
        return Err(OcrError::invalid_input("letterbox target must be positive"));
    }

    let scale = (target as f32 / src_w as f32).min(target as f32 / src_h as f32);
    let new_w = ((src_w as f32 * scale).round() as u32).clamp(1, target);
    let new_h = ((src_h as f32 * scale).round() as u32).clamp(1, target);
    let offset_x = ((target - new_w) / 2) as f32;
    let offset_y = ((target - new_h) / 2) as f32;

    let resized = if (new_w, new_h) == (src_w, src_h) {
        image.clone()
    } else {
        imageops::resize(image, new_w, new_h, imageops::FilterType::Triangle)
    };

    let mut tensor = Tensor4D::zeros((1, 3, target as usize, target as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let ty = y as usize + offset_y as usize;
        let tx = x as usize + offset_x as usize;
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = pixel.0[c] as f32 / 255.0;
        }
    }

    let transform = LetterboxTransform::new(offset_x, offset_y, scale)?;

    tracing::debug!(
        target: "preprocess",
        src = ?(src_w, src_h),
        scaled = ?(new_w, new_h),
        ?transform,
        "Letterboxed image into model input"
    );

    Ok((tensor, transform))
}

/// Shapes a cell crop into a recognition input tensor.
///
/// The crop is resized to `height` preserving aspect ratio, right-padded
/// with black to `max_width`, and normalized to [0, 1] in NCHW layout.
pub fn crop_to_tensor(
    crop: &RgbImage,
    height: u32,
    max_width: u32,
) -> Result<Tensor4D, OcrError> {
    let (src_w, src_h) = crop.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(OcrError::invalid_input("crop has a zero dimension"));
    }
    if height == 0 || max_width == 0 {
        return Err(OcrError::invalid_input(
            "recognition input dimensions must be positive",
        ));
    }

    let ratio = src_w as f32 / src_h as f32;
    let new_w = ((height as f32 * ratio).round() as u32).clamp(1, max_width);
    let resized = imageops::resize(crop, new_w, height, imageops::FilterType::Triangle);

    let mut tensor = Tensor4D::zeros((1, 3, height as usize, max_width as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel.0[c] as f32 / 255.0;
        }
    }
    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_inverse_round_trip_recovers_box() {
        let transform = LetterboxTransform::new(0.0, 160.0, 0.5).unwrap();
        let source = OrientedBox::new(200.0, 120.0, 80.0, 24.0, 5.0);
        let round_tripped = transform.to_source_space(&transform.to_model_space(&source));
        assert!((round_tripped.cx - source.cx).abs() <= 1.0);
        assert!((round_tripped.cy - source.cy).abs() <= 1.0);
        assert!((round_tripped.width - source.width).abs() <= 1.0);
        assert!((round_tripped.height - source.height).abs() <= 1.0);
        assert_eq!(round_tripped.angle, source.angle);
    }

    #[test]
    fn test_to_source_space_clamps_to_non_negative() {
        let transform = LetterboxTransform::new(100.0, 100.0, 1.0).unwrap();
        let bx = OrientedBox::new(40.0, 50.0, 10.0, 10.0, 0.0);
        let mapped = transform.to_source_space(&bx);
        assert_eq!(mapped.cx, 0.0);
        assert_eq!(mapped.cy, 0.0);
    }

    #[test]
    fn test_zero_scale_is_rejected() {
        assert!(LetterboxTransform::new(0.0, 0.0, 0.0).is_err());
        assert!(LetterboxTransform::new(0.0, 0.0, f32::NAN).is_err());
    }

    #[test]
    fn test_letterbox_wide_image_pads_vertically() {
        let image = RgbImage::from_pixel(1280, 640, Rgb([255, 255, 255]));
        let (tensor, transform) = letterbox_to_tensor(&image, 640).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert!((transform.scale - 0.5).abs() < 1e-6);
        assert_eq!(transform.offset_x, 0.0);
        assert_eq!(transform.offset_y, 160.0);
        // Padding rows stay zero, content rows are normalized white.
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
        assert!((tensor[[0, 0, 320, 320]] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_letterbox_identity_for_exact_fit() {
        let image = RgbImage::from_pixel(640, 640, Rgb([128, 0, 0]));
        let (_, transform) = letterbox_to_tensor(&image, 640).unwrap();
        assert_eq!(transform.scale, 1.0);
        assert_eq!(transform.offset_x, 0.0);
        assert_eq!(transform.offset_y, 0.0);
    }

    #[test]
    fn test_crop_to_tensor_pads_to_fixed_width() {
        let crop = RgbImage::from_pixel(24, 12, Rgb([255, 255, 255]));
        let tensor = crop_to_tensor(&crop, 48, 320).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 48, 320]);
        // Resized content is 96 wide; the padding tail stays zero.
        assert!((tensor[[0, 1, 10, 50]] - 1.0).abs() < 1e-3);
        assert_eq!(tensor[[0, 1, 10, 300]], 0.0);
    }

    #[test]
    fn test_crop_wider_than_max_width_is_clamped() {
        let crop = RgbImage::from_pixel(4000, 10, Rgb([10, 10, 10]));
        let tensor = crop_to_tensor(&crop, 48, 320).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 48, 320]);
    }
}
