//! Labeled LiDAR/pixel correspondence files and the projection overlay.

use crate::json::{read_json, write_json};
use fusion_core::{CorrespondenceView, FusionError, Pt2, Pt3, Real};
use fusion_imgproc::draw::draw_marker;
use fusion_linear::{ProjectionMatrix, ProjectionSolver};
use image::{Rgb, RgbImage};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `N` pixels (`N × 2`) and the `N` sensor points (`N × 3`) they label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceSet {
    pub pixels: Vec<[Real; 2]>,
    pub points: Vec<[Real; 3]>,
}

impl CorrespondenceSet {
    pub fn from_view(view: &CorrespondenceView) -> Self {
        Self {
            pixels: view.points_2d.iter().map(|p| [p.x, p.y]).collect(),
            points: view.points_3d.iter().map(|p| [p.x, p.y, p.z]).collect(),
        }
    }

    /// # Errors
    ///
    /// `Estimation` when the pixel and point counts differ.
    pub fn to_view(&self) -> Result<CorrespondenceView, FusionError> {
        if self.pixels.len() != self.points.len() {
            return Err(FusionError::estimation(format!(
                "{} pixels but {} sensor points",
                self.pixels.len(),
                self.points.len()
            )));
        }
        Ok(CorrespondenceView {
            points_3d: self.points.iter().map(|p| Pt3::new(p[0], p[1], p[2])).collect(),
            points_2d: self.pixels.iter().map(|p| Pt2::new(p[0], p[1])).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn load(path: &Path) -> Result<Self, FusionError> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), FusionError> {
        write_json(path, self)
    }
}

/// Solve the projection matrix from a correspondence set of exactly six pairs.
pub fn solve_projection(set: &CorrespondenceSet) -> Result<ProjectionMatrix, FusionError> {
    let view = set.to_view()?;
    let p = ProjectionSolver::from_view(&view)?;
    let errors = p.reprojection_errors(&view)?;
    info!(
        "projection DLT: max reprojection error {:.3e} px",
        errors.iter().copied().fold(0.0, Real::max)
    );
    Ok(p)
}

pub fn load_projection(path: &Path) -> Result<ProjectionMatrix, FusionError> {
    read_json(path)
}

pub fn save_projection(path: &Path, p: &ProjectionMatrix) -> Result<(), FusionError> {
    write_json(path, p)
}

/// Integer pixel positions (truncated toward zero) of `points`.
pub fn project_points(p: &ProjectionMatrix, points: &[Pt3]) -> Result<Vec<(i64, i64)>, FusionError> {
    points
        .iter()
        .map(|pt| p.project_to_pixel(pt).map_err(FusionError::from))
        .collect()
}

/// Draw a filled marker at every pixel position.
pub fn draw_projections(img: &mut RgbImage, pixels: &[(i64, i64)], radius: i64, color: Rgb<u8>) {
    for &px in pixels {
        draw_marker(img, px, radius, color);
    }
}
