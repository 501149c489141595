//! BRIEF binary descriptors on a 9×9 patch.

use fusion_imgproc::{Corner, ImageF32};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Number of intensity comparisons per descriptor.
pub const DESCRIPTOR_BITS: usize = 256;
/// Half size of the sampling patch; offsets lie in `[-PATCH_RADIUS, PATCH_RADIUS]`.
pub const PATCH_RADIUS: i32 = 4;
const PATTERN_SEED: u64 = 0x0B81_EF00;

pub type Descriptor = [u8; DESCRIPTOR_BITS / 8];

/// A described corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: u32,
    pub y: u32,
    pub score: f32,
    pub descriptor: Descriptor,
}

/// Fixed set of point pairs compared by every descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct BriefPattern {
    pairs: Vec<[(i32, i32); 2]>,
}

impl Default for BriefPattern {
    fn default() -> Self {
        Self::from_seed(PATTERN_SEED)
    }
}

impl BriefPattern {
    /// Pattern of uniformly drawn offset pairs; identical for identical seeds.
    pub fn from_seed(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut offset = || {
            (
                rng.random_range(-PATCH_RADIUS..=PATCH_RADIUS),
                rng.random_range(-PATCH_RADIUS..=PATCH_RADIUS),
            )
        };
        let pairs = (0..DESCRIPTOR_BITS)
            .map(|_| [offset(), offset()])
            .collect();
        Self { pairs }
    }

    pub fn pairs(&self) -> &[[(i32, i32); 2]] {
        &self.pairs
    }

    /// Bit `i` is set when the first sample of pair `i` is darker than the second.
    ///
    /// `None` if the patch around `(x, y)` leaves the image.
    pub fn describe(&self, img: &ImageF32, x: u32, y: u32) -> Option<Descriptor> {
        let (x, y) = (x as i32, y as i32);
        if x < PATCH_RADIUS
            || y < PATCH_RADIUS
            || x + PATCH_RADIUS >= img.w as i32
            || y + PATCH_RADIUS >= img.h as i32
        {
            return None;
        }
        let at = |(dx, dy): (i32, i32)| img.get((x + dx) as usize, (y + dy) as usize);
        let mut desc = [0u8; DESCRIPTOR_BITS / 8];
        for (bit, [p, q]) in self.pairs.iter().enumerate() {
            if at(*p) < at(*q) {
                desc[bit / 8] |= 1 << (bit % 8);
            }
        }
        Some(desc)
    }

    /// Describe `corners`, dropping those too close to the border.
    pub fn compute(&self, img: &ImageF32, corners: &[Corner]) -> Vec<Keypoint> {
        corners
            .iter()
            .filter_map(|c| {
                self.describe(img, c.x, c.y).map(|descriptor| Keypoint {
                    x: c.x,
                    y: c.y,
                    score: c.score,
                    descriptor,
                })
            })
            .collect()
    }
}
