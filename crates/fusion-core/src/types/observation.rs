//! Observation types for calibration and projection data.
//!
//! [`CorrespondenceView`] is the canonical 3-D/2-D pairing used by chessboard
//! calibration (board points on `Z = 0`) and by the LiDAR projection solver
//! (sensor-frame points).

use crate::{Pt2, Pt3};
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// One 3-D sensor/target coordinate paired with its pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointCorrespondence {
    pub point: Pt3,
    pub pixel: Pt2,
}

/// A single view containing 2D-3D point correspondences.
///
/// # Example
///
/// ```
/// use fusion_core::{CorrespondenceView, Pt3, Pt2};
///
/// let points_3d = vec![Pt3::new(0.0, 0.0, 0.0), Pt3::new(0.1, 0.0, 0.0)];
/// let points_2d = vec![Pt2::new(320.0, 240.0), Pt2::new(400.0, 240.0)];
/// let view = CorrespondenceView::new(points_3d, points_2d).unwrap();
///
/// assert_eq!(view.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceView {
    /// 3D points in target or sensor frame.
    pub points_3d: Vec<Pt3>,
    /// Corresponding 2D pixel observations.
    pub points_2d: Vec<Pt2>,
}

impl CorrespondenceView {
    /// # Errors
    ///
    /// Returns an error if the 3D and 2D point counts don't match.
    pub fn new(points_3d: Vec<Pt3>, points_2d: Vec<Pt2>) -> Result<Self> {
        ensure!(
            points_3d.len() == points_2d.len(),
            "3D / 2D point counts must match: {} vs {}",
            points_3d.len(),
            points_2d.len()
        );
        Ok(Self {
            points_3d,
            points_2d,
        })
    }

    pub fn from_pairs(pairs: &[PointCorrespondence]) -> Self {
        Self {
            points_3d: pairs.iter().map(|c| c.point).collect(),
            points_2d: pairs.iter().map(|c| c.pixel).collect(),
        }
    }

    /// Board coordinates of a planar (`Z = 0`) target.
    pub fn planar_points(&self) -> Vec<Pt2> {
        self.points_3d
            .iter()
            .map(|p3| Pt2::new(p3.x, p3.y))
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points_3d.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points_3d.is_empty()
    }

    /// Iterate over (3D point, 2D point) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Pt3, &Pt2)> {
        self.points_3d.iter().zip(self.points_2d.iter())
    }

    pub fn pairs(&self) -> Vec<PointCorrespondence> {
        self.iter()
            .map(|(p, px)| PointCorrespondence {
                point: *p,
                pixel: *px,
            })
            .collect()
    }
}

/// Summary statistics for reprojection errors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReprojectionStats {
    /// Mean reprojection error in pixels.
    pub mean: f64,
    /// Root mean square error in pixels.
    pub rms: f64,
    /// Maximum reprojection error in pixels.
    pub max: f64,
    /// Number of points evaluated.
    pub count: usize,
}

impl ReprojectionStats {
    /// Compute statistics from a collection of errors.
    pub fn from_errors(errors: &[f64]) -> Self {
        if errors.is_empty() {
            return Self {
                mean: 0.0,
                rms: 0.0,
                max: 0.0,
                count: 0,
            };
        }

        let sum: f64 = errors.iter().sum();
        let sum_sq: f64 = errors.iter().map(|e| e * e).sum();
        let max = errors.iter().cloned().fold(0.0_f64, f64::max);
        let n = errors.len() as f64;

        Self {
            mean: sum / n,
            rms: (sum_sq / n).sqrt(),
            max,
            count: errors.len(),
        }
    }

    /// Pool several per-view statistics into one.
    pub fn combine(stats: &[ReprojectionStats]) -> Self {
        let count: usize = stats.iter().map(|s| s.count).sum();
        if count == 0 {
            return Self::from_errors(&[]);
        }
        let n = count as f64;
        let sum: f64 = stats.iter().map(|s| s.mean * s.count as f64).sum();
        let sum_sq: f64 = stats.iter().map(|s| s.rms * s.rms * s.count as f64).sum();
        Self {
            mean: sum / n,
            rms: (sum_sq / n).sqrt(),
            max: stats.iter().map(|s| s.max).fold(0.0, f64::max),
            count,
        }
    }
}
