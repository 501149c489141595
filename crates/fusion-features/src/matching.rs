//! Brute-force Hamming matching with ratio test and cross-check.

use crate::brief::Descriptor;
use serde::{Deserialize, Serialize};

/// Correspondence between keypoint `index1` of the first image and
/// `index2` of the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub index1: usize,
    pub index2: usize,
    /// Hamming distance between the two descriptors.
    pub distance: u32,
}

#[inline]
pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Match every descriptor of `desc1` to its nearest neighbour in `desc2`.
///
/// A match is kept when `best < ratio * second_best` (a lone candidate
/// always passes) and, with `cross_check`, when it is also the nearest
/// neighbour in the reverse direction. Ties go to the lower index. The
/// output follows the order of `desc1`.
pub fn match_descriptors(
    desc1: &[Descriptor],
    desc2: &[Descriptor],
    ratio: f32,
    cross_check: bool,
) -> Vec<Match> {
    if desc1.is_empty() || desc2.is_empty() {
        return Vec::new();
    }

    let reverse_best: Option<Vec<usize>> = cross_check.then(|| {
        desc2
            .iter()
            .map(|d2| {
                let mut best = (0, u32::MAX);
                for (i, d1) in desc1.iter().enumerate() {
                    let dist = hamming_distance(d1, d2);
                    if dist < best.1 {
                        best = (i, dist);
                    }
                }
                best.0
            })
            .collect()
    });

    let mut matches = Vec::new();
    for (i, d1) in desc1.iter().enumerate() {
        let mut best = (0usize, u32::MAX);
        let mut second = u32::MAX;
        for (j, d2) in desc2.iter().enumerate() {
            let dist = hamming_distance(d1, d2);
            if dist < best.1 {
                second = best.1;
                best = (j, dist);
            } else if dist < second {
                second = dist;
            }
        }
        let (j, dist) = best;
        if (dist as f64) >= ratio as f64 * second as f64 {
            continue;
        }
        if let Some(rev) = &reverse_best {
            if rev[j] != i {
                continue;
            }
        }
        matches.push(Match {
            index1: i,
            index2: j,
            distance: dist,
        });
    }
    matches
}
