//! Separable Gaussian smoothing and 3×3 Sobel gradients with border clamping.

use crate::ImageF32;

/// Horizontal and vertical derivatives.
#[derive(Clone, Debug)]
pub struct Grad {
    pub gx: ImageF32,
    pub gy: ImageF32,
}

/// Normalized 1-D Gaussian kernel with radius `ceil(3σ)`.
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil().max(1.0) as i32;
    let two_s2 = 2.0 * sigma * sigma;
    let mut k: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / two_s2).exp())
        .collect();
    let sum: f32 = k.iter().sum();
    k.iter_mut().for_each(|v| *v /= sum);
    k
}

/// Gaussian blur; `sigma <= 0` returns a copy.
pub fn gaussian_blur(img: &ImageF32, sigma: f32) -> ImageF32 {
    if sigma <= 0.0 || img.w == 0 || img.h == 0 {
        return img.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let r = (kernel.len() / 2) as isize;

    let mut tmp = ImageF32::new(img.w, img.h);
    for y in 0..img.h {
        for x in 0..img.w {
            let acc: f32 = kernel
                .iter()
                .enumerate()
                .map(|(i, k)| k * img.get_clamped(x as isize + i as isize - r, y as isize))
                .sum();
            tmp.set(x, y, acc);
        }
    }

    let mut out = ImageF32::new(img.w, img.h);
    for y in 0..img.h {
        for x in 0..img.w {
            let acc: f32 = kernel
                .iter()
                .enumerate()
                .map(|(i, k)| k * tmp.get_clamped(x as isize, y as isize + i as isize - r))
                .sum();
            out.set(x, y, acc);
        }
    }
    out
}

/// Sobel derivatives scaled by 1/8, i.e. intensity change per pixel.
pub fn sobel(img: &ImageF32) -> Grad {
    let mut gx = ImageF32::new(img.w, img.h);
    let mut gy = ImageF32::new(img.w, img.h);
    for y in 0..img.h as isize {
        for x in 0..img.w as isize {
            let p = |dx: isize, dy: isize| img.get_clamped(x + dx, y + dy);
            let sx = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
            let sy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));
            gx.set(x as usize, y as usize, sx / 8.0);
            gy.set(x as usize, y as usize, sy / 8.0);
        }
    }
    Grad { gx, gy }
}
