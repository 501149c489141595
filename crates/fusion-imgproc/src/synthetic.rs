//! Synthetic images with known geometry.
//!
//! - [`render_chessboard`]: ray-traced board seen through a distorted camera.
//! - [`textured_scene`]: a random texture and an integer-shifted crop of it,
//!   related by a pure translation homography.

use crate::chessboard::ChessboardPattern;
use crate::filter::gaussian_blur;
use crate::ImageF32;
use fusion_core::{Iso3, PinholeCamera, Real};
use image::{GrayImage, Luma};
use nalgebra::{Vector2, Vector3};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Samples per pixel side when rendering.
const SUPERSAMPLE: usize = 8;

/// Render the board of `pattern` at pose `cam_from_board`.
///
/// The board has `(cols + 1) × (rows + 1)` squares so that its inner
/// corners are exactly `pattern.object_points()`; everything else is white.
/// Each pixel averages an 8×8 supersampling grid, which keeps the
/// rendered edge positions within 1/16 px of the projected geometry.
pub fn render_chessboard(
    camera: &PinholeCamera,
    cam_from_board: &Iso3,
    pattern: &ChessboardPattern,
    width: u32,
    height: u32,
) -> GrayImage {
    let mut cam = camera.clone();
    cam.dist.iters = cam.dist.iters.max(20);
    let s = pattern.square_size;
    let x_max = pattern.cols as Real * s;
    let y_max = pattern.rows as Real * s;
    let normal = cam_from_board.rotation * Vector3::z();
    let origin = cam_from_board.translation.vector;
    let plane_d = normal.dot(&origin);
    let board_from_cam = cam_from_board.inverse();

    let shade = |u: Real, v: Real| -> Real {
        let dir = cam.backproject_pixel(&Vector2::new(u, v)).dir;
        let denom = normal.dot(&dir);
        if denom.abs() < 1e-12 {
            return 255.0;
        }
        let lambda = plane_d / denom;
        if lambda <= 0.0 {
            return 255.0;
        }
        let pb = board_from_cam.transform_point(&(dir * lambda).into());
        if pb.x < -s || pb.y < -s || pb.x >= x_max || pb.y >= y_max {
            return 255.0;
        }
        let ix = (pb.x / s).floor() as i64;
        let iy = (pb.y / s).floor() as i64;
        if (ix + iy).rem_euclid(2) == 0 {
            0.0
        } else {
            255.0
        }
    };

    GrayImage::from_fn(width, height, |x, y| {
        let step = 1.0 / SUPERSAMPLE as Real;
        let offset = |k: usize| (k as Real + 0.5) * step - 0.5;
        let mut acc = 0.0;
        for sy in 0..SUPERSAMPLE {
            for sx in 0..SUPERSAMPLE {
                acc += shade(x as Real + offset(sx), y as Real + offset(sy));
            }
        }
        Luma([(acc / (SUPERSAMPLE * SUPERSAMPLE) as Real).round() as u8])
    })
}

/// Smooth random texture of `width × height` pixels.
pub fn random_texture(width: usize, height: usize, seed: u64) -> ImageF32 {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = ImageF32::new(width, height);
    for v in img.data.iter_mut() {
        *v = rng.random_range(0.0..255.0);
    }
    let mut img = gaussian_blur(&img, 2.0);

    // Stretch the blurred noise back to the full range.
    let (lo, hi) = img
        .data
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let scale = if hi > lo { 255.0 / (hi - lo) } else { 0.0 };
    img.data.iter_mut().for_each(|v| *v = (*v - lo) * scale);
    img
}

/// Two overlapping views of one texture.
///
/// The second view is the first shifted so that pixel `(x, y)` of view 2
/// shows the same content as `(x + shift.0, y + shift.1)` of view 1; the
/// homography from view 2 to view 1 is a translation by `shift`.
pub fn textured_scene(
    width: u32,
    height: u32,
    shift: (u32, u32),
    seed: u64,
) -> (GrayImage, GrayImage) {
    let canvas = random_texture(
        (width + shift.0) as usize,
        (height + shift.1) as usize,
        seed,
    )
    .to_gray();
    let view1 = image::imageops::crop_imm(&canvas, 0, 0, width, height).to_image();
    let view2 = image::imageops::crop_imm(&canvas, shift.0, shift.1, width, height).to_image();
    (view1, view2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_core::{BrownConrady5, Camera, FxFyCxCySkew};
    use nalgebra::{Translation3, UnitQuaternion};

    #[test]
    fn chessboard_render_has_both_colours() {
        let cam = Camera::new(
            FxFyCxCySkew {
                fx: 400.0,
                fy: 400.0,
                cx: 160.0,
                cy: 120.0,
                skew: 0.0,
            },
            BrownConrady5::zero(8),
        );
        let pattern = ChessboardPattern {
            cols: 4,
            rows: 3,
            square_size: 0.05,
        };
        let pose = Iso3::from_parts(
            Translation3::new(-0.075, -0.05, 0.6),
            UnitQuaternion::identity(),
        );
        let img = render_chessboard(&cam, &pose, &pattern, 320, 240);
        // The first inner corner projects to (110, 86.7); square (0, 0) and
        // square (-1, -1) are black, square (1, 0) is white.
        assert_eq!(img.get_pixel(120, 97)[0], 0);
        assert_eq!(img.get_pixel(95, 70)[0], 0);
        assert_eq!(img.get_pixel(160, 100)[0], 255);
        assert_eq!(img.get_pixel(5, 5)[0], 255);
    }

    #[test]
    fn textured_views_are_shifted_copies() {
        let (a, b) = textured_scene(64, 48, (10, 4), 7);
        assert_eq!(a.dimensions(), (64, 48));
        for y in 0..44 {
            for x in 0..54 {
                assert_eq!(b.get_pixel(x, y), a.get_pixel(x + 10, y + 4));
            }
        }
    }
}
