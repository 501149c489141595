use crate::config::StitchConfig;
use fusion_core::{FusionError, Mat3};
use fusion_imgproc::warp::{warp_perspective, warped_extent};
use image::{imageops, ImageBuffer, Pixel};
use log::debug;

/// Warps the second image into the first image's frame and overlays the
/// first image at the origin, without blending.
#[derive(Debug, Clone, Default)]
pub struct ImageStitcher {
    pub config: StitchConfig,
}

impl ImageStitcher {
    pub fn new(config: StitchConfig) -> Self {
        Self { config }
    }

    /// Mosaic size: the warped extent of `image2`, at least `image1`'s size.
    ///
    /// # Errors
    ///
    /// `NumericalDegeneracy` when a corner of image 2 maps onto or past the
    /// line at infinity, or the canvas exceeds `max_canvas_side`.
    pub fn canvas_size(
        &self,
        image1: (u32, u32),
        image2: (u32, u32),
        h: &Mat3,
    ) -> Result<(u32, u32), FusionError> {
        let (max_x, max_y) = warped_extent(h, image2.0, image2.1)
            .ok_or_else(|| FusionError::degenerate("image corner maps past the horizon"))?;
        let limit = self.config.max_canvas_side as f64;
        if !(max_x.is_finite() && max_y.is_finite()) || max_x > limit || max_y > limit {
            return Err(FusionError::degenerate(format!(
                "warped extent ({max_x:.0}, {max_y:.0}) exceeds the canvas limit {limit}"
            )));
        }
        let width = image1.0.max(max_x.ceil().max(0.0) as u32);
        let height = image1.1.max(max_y.ceil().max(0.0) as u32);
        Ok((width, height))
    }

    /// Stitch with `h` mapping `image2` pixels into `image1`'s frame.
    pub fn stitch<P>(
        &self,
        image1: &ImageBuffer<P, Vec<u8>>,
        image2: &ImageBuffer<P, Vec<u8>>,
        h: &Mat3,
    ) -> Result<ImageBuffer<P, Vec<u8>>, FusionError>
    where
        P: Pixel<Subpixel = u8>,
    {
        let (width, height) = self.canvas_size(image1.dimensions(), image2.dimensions(), h)?;
        debug!("stitching into a {width}x{height} canvas");
        let mut mosaic = warp_perspective(image2, h, width, height)?;
        imageops::replace(&mut mosaic, image1, 0, 0);
        Ok(mosaic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn translated_image_extends_the_canvas() {
        let left = RgbImage::from_pixel(40, 30, Rgb([10, 20, 30]));
        let right = RgbImage::from_fn(40, 30, |x, y| Rgb([x as u8, y as u8, 200]));
        let h = Mat3::new(1.0, 0.0, 25.0, 0.0, 1.0, 6.0, 0.0, 0.0, 1.0);
        let mosaic = ImageStitcher::default().stitch(&left, &right, &h).unwrap();

        assert_eq!(mosaic.dimensions(), (65, 36));
        assert_eq!(mosaic.get_pixel(5, 5), &Rgb([10, 20, 30]));
        assert_eq!(mosaic.get_pixel(39, 29), &Rgb([10, 20, 30]));
        assert_eq!(mosaic.get_pixel(50, 10), &Rgb([25, 4, 200]));
        assert_eq!(mosaic.get_pixel(50, 2), &Rgb([0, 0, 0]));
    }

    #[test]
    fn canvas_is_at_least_the_first_image() {
        let h = Mat3::new(0.5, 0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 1.0);
        let size = ImageStitcher::default()
            .canvas_size((100, 80), (60, 60), &h)
            .unwrap();
        assert_eq!(size, (100, 80));
    }

    #[test]
    fn runaway_homography_is_rejected() {
        let h = Mat3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, -0.00999, 0.0, 1.0);
        let err = ImageStitcher::default()
            .canvas_size((100, 100), (100, 100), &h)
            .unwrap_err();
        assert!(matches!(err, FusionError::NumericalDegeneracy(_)));
    }

    #[test]
    fn corner_past_the_horizon_is_rejected() {
        let left = RgbImage::new(100, 100);
        let right = RgbImage::new(100, 100);
        let h = Mat3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, -0.011, 0.0, 1.0);
        let err = ImageStitcher::default()
            .stitch(&left, &right, &h)
            .unwrap_err();
        assert!(matches!(err, FusionError::NumericalDegeneracy(_)), "{err:?}");
    }
}
