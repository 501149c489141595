//! Lens undistortion by inverse remapping.
//!
//! The undistorted view uses an adjusted camera matrix chosen so that every
//! output pixel sees valid input (no black borders). Each output pixel is
//! mapped through the new camera's inverse, the forward distortion model and
//! the original camera matrix, then sampled bilinearly.

use fusion_core::{
    DistortionModel, FusionError, FxFyCxCySkew, IntrinsicsModel, PinholeCamera, Real,
};
use image::{ImageBuffer, Pixel};
use log::debug;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

const BORDER_SAMPLES: usize = 9;

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Coordinates this far outside the image still sample the border pixel.
const EDGE_TOLERANCE: f32 = 1e-3;

/// Bilinear sample of an 8-bit image; `None` outside `[0, w-1] × [0, h-1]`.
pub fn sample_bilinear<P>(img: &ImageBuffer<P, Vec<u8>>, x: f32, y: f32) -> Option<P>
where
    P: Pixel<Subpixel = u8>,
{
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let (xmax, ymax) = ((w - 1) as f32, (h - 1) as f32);
    let inside = |v: f32, max: f32| v >= -EDGE_TOLERANCE && v <= max + EDGE_TOLERANCE;
    if !(inside(x, xmax) && inside(y, ymax)) {
        return None;
    }
    let (x, y) = (x.clamp(0.0, xmax), y.clamp(0.0, ymax));
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);
    let mut out = *p00;
    for (c, o) in out.channels_mut().iter_mut().enumerate() {
        let top = p00.channels()[c] as f32 * (1.0 - fx) + p10.channels()[c] as f32 * fx;
        let bottom = p01.channels()[c] as f32 * (1.0 - fx) + p11.channels()[c] as f32 * fx;
        *o = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(out)
}

/// Camera matrix for an undistorted view without invalid pixels, and the
/// valid-pixel rectangle in that view.
///
/// Undistorts a grid of points along the image border and keeps the largest
/// axis-aligned rectangle inside it, stretched to the full image size.
///
/// # Errors
///
/// `NumericalDegeneracy` when the undistorted border folds over itself.
pub fn optimal_new_camera_matrix(
    camera: &PinholeCamera,
    width: u32,
    height: u32,
) -> Result<(FxFyCxCySkew<Real>, Roi), FusionError> {
    if width < 2 || height < 2 {
        return Err(FusionError::degenerate(format!(
            "image of {width}x{height} pixels is too small to undistort"
        )));
    }
    let (wm1, hm1) = ((width - 1) as Real, (height - 1) as Real);
    let n = BORDER_SAMPLES - 1;
    let at = |i: usize, j: usize| {
        let px = Vector2::new(wm1 * i as Real / n as Real, hm1 * j as Real / n as Real);
        camera.normalize_pixel(&px)
    };

    let x0 = (0..=n).map(|j| at(0, j).x).fold(Real::NEG_INFINITY, Real::max);
    let x1 = (0..=n).map(|j| at(n, j).x).fold(Real::INFINITY, Real::min);
    let y0 = (0..=n).map(|i| at(i, 0).y).fold(Real::NEG_INFINITY, Real::max);
    let y1 = (0..=n).map(|i| at(i, n).y).fold(Real::INFINITY, Real::min);
    if !(x1 > x0 && y1 > y0) {
        return Err(FusionError::degenerate(
            "undistorted image border has no interior",
        ));
    }

    let fx = wm1 / (x1 - x0);
    let fy = hm1 / (y1 - y0);
    let new_k = FxFyCxCySkew {
        fx,
        fy,
        cx: -fx * x0,
        cy: -fy * y0,
        skew: 0.0,
    };

    const ROUND_EPS: Real = 1e-6;
    let u0 = (fx * x0 + new_k.cx - ROUND_EPS).ceil().max(0.0);
    let u1 = (fx * x1 + new_k.cx + ROUND_EPS).floor().min(wm1);
    let v0 = (fy * y0 + new_k.cy - ROUND_EPS).ceil().max(0.0);
    let v1 = (fy * y1 + new_k.cy + ROUND_EPS).floor().min(hm1);
    let roi = Roi {
        x: u0 as u32,
        y: v0 as u32,
        width: (u1 - u0 + 1.0) as u32,
        height: (v1 - v0 + 1.0) as u32,
    };
    Ok((new_k, roi))
}

/// Precomputed source coordinates for undistorting images of one size.
#[derive(Debug, Clone)]
pub struct UndistortMap {
    width: u32,
    height: u32,
    new_k: FxFyCxCySkew<Real>,
    roi: Roi,
    /// Source `(x, y)` per output pixel, row-major.
    map: Vec<(f32, f32)>,
}

impl UndistortMap {
    pub fn new(camera: &PinholeCamera, width: u32, height: u32) -> Result<Self, FusionError> {
        let (new_k, roi) = optimal_new_camera_matrix(camera, width, height)?;
        let mut map = Vec::with_capacity(width as usize * height as usize);
        for v in 0..height {
            for u in 0..width {
                let n = new_k.from_pixel(&Vector2::new(u as Real, v as Real));
                let src = camera.k.to_pixel(&camera.dist.distort(&n));
                map.push((src.x as f32, src.y as f32));
            }
        }
        debug!(
            "undistort map {}x{}: new fx={:.2} fy={:.2}, roi {:?}",
            width, height, new_k.fx, new_k.fy, roi
        );
        Ok(Self {
            width,
            height,
            new_k,
            roi,
            map,
        })
    }

    /// Intrinsics of the remapped image before cropping.
    pub fn new_camera(&self) -> &FxFyCxCySkew<Real> {
        &self.new_k
    }

    pub fn roi(&self) -> Roi {
        self.roi
    }

    /// Remap `img` and crop to the valid rectangle.
    ///
    /// # Errors
    ///
    /// `Estimation` if `img` does not have the size the map was built for.
    pub fn apply<P>(&self, img: &ImageBuffer<P, Vec<u8>>) -> Result<ImageBuffer<P, Vec<u8>>, FusionError>
    where
        P: Pixel<Subpixel = u8>,
    {
        if img.dimensions() != (self.width, self.height) {
            return Err(FusionError::estimation(format!(
                "undistort map is for {}x{} images, got {}x{}",
                self.width,
                self.height,
                img.width(),
                img.height()
            )));
        }
        let Roi {
            x,
            y,
            width,
            height,
        } = self.roi;
        Ok(ImageBuffer::from_fn(width, height, |u, v| {
            let (sx, sy) = self.map[((v + y) * self.width + u + x) as usize];
            sample_bilinear(img, sx, sy).unwrap_or_else(|| blank_pixel(img))
        }))
    }
}

fn blank_pixel<P: Pixel<Subpixel = u8>>(img: &ImageBuffer<P, Vec<u8>>) -> P {
    let mut p = *img.get_pixel(0, 0);
    p.channels_mut().iter_mut().for_each(|c| *c = 0);
    p
}

/// Undistort `img` with `camera` (alpha = 0, cropped to the valid rectangle).
pub fn undistort_image<P>(
    img: &ImageBuffer<P, Vec<u8>>,
    camera: &PinholeCamera,
) -> Result<ImageBuffer<P, Vec<u8>>, FusionError>
where
    P: Pixel<Subpixel = u8>,
{
    UndistortMap::new(camera, img.width(), img.height())?.apply(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_core::{BrownConrady5, Camera};
    use image::{GrayImage, Luma};

    fn camera(k1: Real, k2: Real) -> PinholeCamera {
        Camera::new(
            FxFyCxCySkew {
                fx: 300.0,
                fy: 300.0,
                cx: 160.0,
                cy: 120.0,
                skew: 0.0,
            },
            BrownConrady5 {
                k1,
                k2,
                k3: 0.0,
                p1: 0.0,
                p2: 0.0,
                iters: 20,
            },
        )
    }

    #[test]
    fn zero_distortion_keeps_camera_and_image() {
        let cam = camera(0.0, 0.0);
        let (k, roi) = optimal_new_camera_matrix(&cam, 320, 240).unwrap();
        assert!((k.fx - 300.0).abs() < 1e-9 && (k.cx - 160.0).abs() < 1e-9);
        assert_eq!(
            roi,
            Roi {
                x: 0,
                y: 0,
                width: 320,
                height: 240
            }
        );

        let img = GrayImage::from_fn(320, 240, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        assert_eq!(undistort_image(&img, &cam).unwrap(), img);
    }

    #[test]
    fn barrel_undistortion_keeps_every_pixel_inside_the_source() {
        let map = UndistortMap::new(&camera(-0.3, 0.05), 320, 240).unwrap();
        assert!(map.new_camera().fx < 300.0, "{:?}", map.new_camera());

        let white = GrayImage::from_pixel(320, 240, Luma([255]));
        let out = map.apply(&white).unwrap();
        let black = out.pixels().filter(|p| p[0] == 0).count();
        assert_eq!(black, 0, "{black} pixels sampled outside the source");
    }

    #[test]
    fn pincushion_undistortion_zooms_in() {
        let (k, _) = optimal_new_camera_matrix(&camera(0.2, 0.0), 320, 240).unwrap();
        assert!(k.fx > 300.0, "{k:?}");
    }

    /// A pattern defined on undistorted normalized coordinates, imaged through
    /// a distorted camera, comes back as the same pattern under the new camera.
    #[test]
    fn undistort_inverts_forward_distortion() {
        let cam = camera(-0.25, 0.04);
        let pattern = |n: Vector2<Real>| 127.5 + 100.0 * (6.0 * n.x).sin() * (5.0 * n.y).cos();
        let distorted = GrayImage::from_fn(320, 240, |x, y| {
            let n = cam.normalize_pixel(&Vector2::new(x as Real, y as Real));
            Luma([pattern(n).round() as u8])
        });

        let map = UndistortMap::new(&cam, 320, 240).unwrap();
        let out = map.apply(&distorted).unwrap();
        let roi = map.roi();
        let mut worst: Real = 0.0;
        for v in 10..out.height() - 10 {
            for u in 10..out.width() - 10 {
                let n = map
                    .new_camera()
                    .from_pixel(&Vector2::new((u + roi.x) as Real, (v + roi.y) as Real));
                let err = (out.get_pixel(u, v)[0] as Real - pattern(n)).abs();
                worst = worst.max(err);
            }
        }
        assert!(worst < 6.0, "max deviation {worst}");
    }

    #[test]
    fn wrong_size_is_rejected() {
        let map = UndistortMap::new(&camera(-0.1, 0.0), 64, 48).unwrap();
        let img = GrayImage::new(32, 32);
        assert!(map.apply(&img).is_err());
    }
}
