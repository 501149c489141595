//! Perspective warping and side-by-side composition of 8-bit images.

use crate::remap::sample_bilinear;
use fusion_core::{FusionError, Mat3, Real};
use image::{imageops, ImageBuffer, Pixel};
use nalgebra::Vector3;

/// Bottom-right extent `(max_x, max_y)` of an image of `width × height`
/// pixels warped by `h`.
///
/// `None` if a corner lands on or behind the line at infinity, i.e. the
/// homogeneous `w` of the four corners vanishes or changes sign.
pub fn warped_extent(h: &Mat3, width: u32, height: u32) -> Option<(Real, Real)> {
    const MIN_W: Real = 1e-12;
    let (w, hh) = (width as Real, height as Real);
    let corners = [(0.0, 0.0), (w, 0.0), (0.0, hh), (w, hh)].map(|(x, y)| h * Vector3::new(x, y, 1.0));
    let sign = corners[0].z.signum();
    let mut max = (Real::NEG_INFINITY, Real::NEG_INFINITY);
    for p in corners {
        if p.z * sign <= MIN_W {
            return None;
        }
        max.0 = max.0.max(p.x / p.z);
        max.1 = max.1.max(p.y / p.z);
    }
    Some(max)
}

/// Warp `src` by `h` (source pixel -> destination pixel) into a
/// `width × height` canvas; pixels that map outside `src` are zero.
///
/// # Errors
///
/// `NumericalDegeneracy` if `h` is not invertible.
pub fn warp_perspective<P>(
    src: &ImageBuffer<P, Vec<u8>>,
    h: &Mat3,
    width: u32,
    height: u32,
) -> Result<ImageBuffer<P, Vec<u8>>, FusionError>
where
    P: Pixel<Subpixel = u8>,
{
    let h_inv = h
        .try_inverse()
        .ok_or_else(|| FusionError::degenerate("homography is not invertible"))?;
    let mut out = ImageBuffer::new(width, height);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let s = h_inv * Vector3::new(x as Real, y as Real, 1.0);
        if s.z.abs() < 1e-12 {
            continue;
        }
        if let Some(v) = sample_bilinear(src, (s.x / s.z) as f32, (s.y / s.z) as f32) {
            *px = v;
        }
    }
    Ok(out)
}

/// Pad the shorter image with zeros to the taller height (odd remainder
/// row at the bottom) and place the two side by side.
pub fn pad_and_concat<P>(
    left: &ImageBuffer<P, Vec<u8>>,
    right: &ImageBuffer<P, Vec<u8>>,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let height = left.height().max(right.height());
    let mut out = ImageBuffer::new(left.width() + right.width(), height);
    let top = |img: &ImageBuffer<P, Vec<u8>>| ((height - img.height()) / 2) as i64;
    imageops::replace(&mut out, left, 0, top(left));
    imageops::replace(&mut out, right, left.width() as i64, top(right));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn translation_warp_shifts_pixels() {
        let src = GrayImage::from_fn(20, 10, |x, y| Luma([(x * 10 + y) as u8]));
        let h = Mat3::new(1.0, 0.0, 5.0, 0.0, 1.0, 2.0, 0.0, 0.0, 1.0);
        let out = warp_perspective(&src, &h, 30, 15).unwrap();
        assert_eq!(out.get_pixel(5, 2), src.get_pixel(0, 0));
        assert_eq!(out.get_pixel(24, 11), src.get_pixel(19, 9));
        assert_eq!(out.get_pixel(2, 2)[0], 0);
        assert_eq!(out.get_pixel(29, 14)[0], 0);
    }

    #[test]
    fn singular_homography_is_rejected() {
        let src = GrayImage::new(4, 4);
        let err = warp_perspective(&src, &Mat3::zeros(), 4, 4).unwrap_err();
        assert!(matches!(err, FusionError::NumericalDegeneracy(_)));
    }

    #[test]
    fn extent_of_translation() {
        let h = Mat3::new(1.0, 0.0, 30.0, 0.0, 1.0, -4.0, 0.0, 0.0, 1.0);
        assert_eq!(warped_extent(&h, 100, 50), Some((130.0, 46.0)));
    }

    #[test]
    fn extent_is_undefined_when_corners_straddle_the_horizon() {
        // w = 1 - 0.011 x is negative at x = 100.
        let h = Mat3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, -0.011, 0.0, 1.0);
        assert_eq!(warped_extent(&h, 100, 100), None);
        // w = 0 exactly on the right edge.
        let h = Mat3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, -0.01, 0.0, 1.0);
        assert_eq!(warped_extent(&h, 100, 100), None);
    }

    #[test]
    fn negated_homography_has_the_same_extent() {
        let h = Mat3::new(1.0, 0.0, 30.0, 0.0, 1.0, -4.0, 1e-3, 0.0, 1.0);
        let a = warped_extent(&h, 100, 50).unwrap();
        let b = warped_extent(&(-h), 100, 50).unwrap();
        assert!((a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9);
    }

    #[test]
    fn pad_puts_odd_row_at_bottom() {
        let left = RgbImage::from_pixel(2, 5, Rgb([9, 9, 9]));
        let right = RgbImage::from_pixel(3, 2, Rgb([200, 0, 0]));
        let out = pad_and_concat(&left, &right);
        assert_eq!(out.dimensions(), (5, 5));
        // 3 padding rows: one above, two below.
        assert_eq!(out.get_pixel(2, 0), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(2, 1), &Rgb([200, 0, 0]));
        assert_eq!(out.get_pixel(4, 2), &Rgb([200, 0, 0]));
        assert_eq!(out.get_pixel(2, 3), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(1, 4), &Rgb([9, 9, 9]));
    }
}
