//! Markers for projected points.

use image::{Rgb, RgbImage};

/// Fill a disk of `radius` pixels around `center`, clipped to the image.
pub fn draw_marker(img: &mut RgbImage, center: (i64, i64), radius: i64, color: Rgb<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let r2 = radius * radius;
    for y in (center.1 - radius).max(0)..=(center.1 + radius).min(h - 1) {
        for x in (center.0 - radius).max(0)..=(center.0 + radius).min(w - 1) {
            let (dx, dy) = (x - center.0, y - center.1);
            if dx * dx + dy * dy <= r2 {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
