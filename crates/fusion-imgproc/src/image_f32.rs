//! Owned single-channel f32 image in row-major layout.

use image::{GrayImage, Luma};

#[derive(Clone, Debug, PartialEq)]
pub struct ImageF32 {
    /// Image width in pixels
    pub w: usize,
    /// Image height in pixels
    pub h: usize,
    /// Backing storage, `w * h` values in row-major order
    pub data: Vec<f32>,
}

impl ImageF32 {
    /// Zero-initialized buffer of size `w × h`.
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![0.0; w * h],
        }
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.w + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[self.idx(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        let i = self.idx(x, y);
        self.data[i] = v;
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[f32] {
        &self.data[y * self.w..(y + 1) * self.w]
    }

    /// Pixel with coordinates clamped to the image.
    #[inline]
    pub fn get_clamped(&self, x: isize, y: isize) -> f32 {
        let xc = x.clamp(0, self.w as isize - 1) as usize;
        let yc = y.clamp(0, self.h as isize - 1) as usize;
        self.get(xc, yc)
    }

    pub fn from_gray(img: &GrayImage) -> Self {
        Self {
            w: img.width() as usize,
            h: img.height() as usize,
            data: img.as_raw().iter().map(|&v| v as f32).collect(),
        }
    }

    /// Round and clamp to 8-bit.
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.w as u32, self.h as u32, |x, y| {
            Luma([self.get(x as usize, y as usize).round().clamp(0.0, 255.0) as u8])
        })
    }

    /// Bilinear sample; `None` when the 2×2 neighbourhood leaves the image.
    pub fn sample(&self, x: f32, y: f32) -> Option<f32> {
        if !(x >= 0.0 && y >= 0.0) || self.w == 0 || self.h == 0 {
            return None;
        }
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        if x0 >= self.w || y0 >= self.h {
            return None;
        }
        let x1 = (x0 + 1).min(self.w - 1);
        let y1 = (y0 + 1).min(self.h - 1);
        if (x1 == x0 && x > x0 as f32) || (y1 == y0 && y > y0 as f32) {
            return None;
        }
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        let top = self.get(x0, y0) * (1.0 - fx) + self.get(x1, y0) * fx;
        let bottom = self.get(x0, y1) * (1.0 - fx) + self.get(x1, y1) * fx;
        Some(top * (1.0 - fy) + bottom * fy)
    }

    /// Bilinear sample with border clamping.
    pub fn sample_clamped(&self, x: f32, y: f32) -> f32 {
        let xc = x.clamp(0.0, (self.w - 1) as f32);
        let yc = y.clamp(0.0, (self.h - 1) as f32);
        self.sample(xc, yc).unwrap_or(0.0)
    }

    pub fn max_value(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }
}
