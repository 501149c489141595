//! Harris corner detection with non-maximum suppression.

use crate::filter::{gaussian_blur, sobel};
use crate::ImageF32;
use log::debug;
use serde::{Deserialize, Serialize};

/// A detected corner at integer pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corner {
    pub x: u32,
    pub y: u32,
    /// Harris response.
    pub score: f32,
}

impl Corner {
    pub fn new(x: u32, y: u32, score: f32) -> Self {
        Self { x, y, score }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarrisParams {
    /// Trace weight in `det(M) - k * trace(M)^2`.
    pub k: f32,
    /// Gaussian integration scale of the structure tensor.
    pub sigma: f32,
    /// Keep responses above `quality * max_response`.
    pub quality: f32,
    /// Half-size of the suppression window.
    pub nms_radius: usize,
    /// Strongest corners to keep; 0 keeps all.
    pub max_corners: usize,
}

impl Default for HarrisParams {
    fn default() -> Self {
        Self {
            k: 0.04,
            sigma: 1.5,
            quality: 0.15,
            nms_radius: 3,
            max_corners: 0,
        }
    }
}

/// Per-pixel Harris response.
pub fn harris_response(img: &ImageF32, k: f32, sigma: f32) -> ImageF32 {
    let g = sobel(img);
    let mut xx = ImageF32::new(img.w, img.h);
    let mut xy = ImageF32::new(img.w, img.h);
    let mut yy = ImageF32::new(img.w, img.h);
    for i in 0..img.data.len() {
        let (gx, gy) = (g.gx.data[i], g.gy.data[i]);
        xx.data[i] = gx * gx;
        xy.data[i] = gx * gy;
        yy.data[i] = gy * gy;
    }
    let xx = gaussian_blur(&xx, sigma);
    let xy = gaussian_blur(&xy, sigma);
    let yy = gaussian_blur(&yy, sigma);

    let mut r = ImageF32::new(img.w, img.h);
    for i in 0..r.data.len() {
        let det = xx.data[i] * yy.data[i] - xy.data[i] * xy.data[i];
        let tr = xx.data[i] + yy.data[i];
        r.data[i] = det - k * tr * tr;
    }
    r
}

/// Local maxima of `response` above `threshold` within a `(2r+1)²` window.
///
/// Plateaus keep only their first pixel in raster order.
pub fn non_max_suppression(response: &ImageF32, radius: usize, threshold: f32) -> Vec<Corner> {
    let r = radius as isize;
    let mut out = Vec::new();
    for y in 0..response.h {
        for x in 0..response.w {
            let v = response.get(x, y);
            if v <= threshold {
                continue;
            }
            let mut is_max = true;
            'window: for dy in -r..=r {
                for dx in -r..=r {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let (nx, ny) = (x as isize + dx, y as isize + dy);
                    if nx < 0 || ny < 0 || nx >= response.w as isize || ny >= response.h as isize {
                        continue;
                    }
                    let n = response.get(nx as usize, ny as usize);
                    let earlier = dy < 0 || (dy == 0 && dx < 0);
                    if n > v || (earlier && n == v) {
                        is_max = false;
                        break 'window;
                    }
                }
            }
            if is_max {
                out.push(Corner::new(x as u32, y as u32, v));
            }
        }
    }
    out
}

/// Harris corners sorted by descending score (raster order on ties).
pub fn harris_corners(img: &ImageF32, params: &HarrisParams) -> Vec<Corner> {
    let response = harris_response(img, params.k, params.sigma);
    let max = response.max_value();
    if !(max > 0.0) {
        return Vec::new();
    }
    let mut corners = non_max_suppression(&response, params.nms_radius, params.quality * max);
    corners.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.y.cmp(&b.y))
            .then(a.x.cmp(&b.x))
    });
    if params.max_corners > 0 {
        corners.truncate(params.max_corners);
    }
    debug!("harris: {} corners (max response {:.3e})", corners.len(), max);
    corners
}
