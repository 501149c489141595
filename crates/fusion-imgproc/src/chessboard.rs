//! Chessboard inner-corner detection.
//!
//! ChESS corners come from `chess-corners` and are assembled into a labelled
//! lattice by `calib-targets`. Only complete `cols × rows` boards are
//! accepted, and the labels are normalised so corners come back in raster
//! order (x fastest): column steps point right and rows keep the image
//! handedness, so the first corner is the top-left one.

use calib_targets::chessboard::{ChessboardDetector, GridGraphParams};
use calib_targets::detect;
use chess_corners::ChessConfig;
use fusion_core::{synthetic::planar::grid_points, Pt2, Pt3, Real};
use image::GrayImage;
use log::debug;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Chessboard geometry: inner corners per row (`cols`) and per column (`rows`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChessboardPattern {
    pub cols: usize,
    pub rows: usize,
    /// Edge length of one square in board units.
    pub square_size: Real,
}

impl Default for ChessboardPattern {
    fn default() -> Self {
        Self {
            cols: 10,
            rows: 7,
            square_size: 1.0,
        }
    }
}

impl ChessboardPattern {
    pub fn corner_count(&self) -> usize {
        self.cols * self.rows
    }

    /// Board-frame corners (`Z = 0`) in detection order.
    pub fn object_points(&self) -> Vec<Pt3> {
        grid_points(self.cols, self.rows, self.square_size)
    }
}

/// Detector tuning, mapped onto `chess-corners` and `calib-targets` settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChessboardParams {
    /// ChESS response threshold relative to the strongest response.
    pub threshold_rel: f32,
    pub nms_radius: u32,
    pub min_cluster_size: u32,
    /// Weaker ChESS corners are dropped before the lattice is assembled.
    pub min_corner_strength: f32,
    /// Accepted distance between neighbouring corners, in pixels.
    pub min_spacing_px: f32,
    pub max_spacing_px: f32,
}

impl Default for ChessboardParams {
    fn default() -> Self {
        Self {
            threshold_rel: 0.2,
            nms_radius: 2,
            min_cluster_size: 2,
            min_corner_strength: 0.0,
            min_spacing_px: 5.0,
            max_spacing_px: 100.0,
        }
    }
}

impl ChessboardParams {
    fn chess_config(&self) -> ChessConfig {
        let mut cfg = ChessConfig::single_scale();
        cfg.params.threshold_rel = self.threshold_rel;
        cfg.params.nms_radius = self.nms_radius;
        cfg.params.min_cluster_size = self.min_cluster_size;
        cfg
    }

    fn detector(&self, pattern: &ChessboardPattern) -> ChessboardDetector {
        let params = calib_targets::ChessboardParams {
            min_corner_strength: self.min_corner_strength,
            min_corners: pattern.corner_count(),
            expected_rows: Some(pattern.rows as u32),
            expected_cols: Some(pattern.cols as u32),
            completeness_threshold: 1.0,
            ..calib_targets::ChessboardParams::default()
        };
        ChessboardDetector::new(params).with_grid_search(GridGraphParams {
            min_spacing_pix: self.min_spacing_px,
            max_spacing_pix: self.max_spacing_px,
            ..GridGraphParams::default()
        })
    }
}

/// Find the `pattern` inner corners in `img`.
///
/// Returns `pattern.corner_count()` pixel positions in raster order, or
/// `None` unless every corner of the board was found.
pub fn detect_chessboard(
    img: &GrayImage,
    pattern: &ChessboardPattern,
    params: &ChessboardParams,
) -> Option<Vec<Pt2>> {
    if pattern.cols < 2 || pattern.rows < 2 {
        return None;
    }
    let corners = detect::detect_corners(img, &params.chess_config());
    debug!("{} ChESS corners", corners.len());
    let result = params.detector(pattern).detect_from_corners(&corners)?;
    let labelled = result.detection.corners.iter().filter_map(|c| {
        let grid = c.grid?;
        Some((
            (grid.i, grid.j),
            Vector2::new(c.position.x as Real, c.position.y as Real),
        ))
    });
    let table = lattice_table(labelled, pattern)?;
    Some(raster_order(table, pattern))
}

/// `rows × cols` table of lattice positions, transposing a board that was
/// labelled with its long side vertical.
fn lattice_table(
    labelled: impl IntoIterator<Item = ((i32, i32), Vector2<Real>)>,
    pattern: &ChessboardPattern,
) -> Option<Vec<Vec<Vector2<Real>>>> {
    let (cols, rows) = (pattern.cols, pattern.rows);
    let labelled: Vec<_> = labelled.into_iter().collect();
    let (max_i, max_j) = labelled
        .iter()
        .fold((0, 0), |(mi, mj), &((i, j), _)| (mi.max(i), mj.max(j)));
    let transposed = (max_i + 1) as usize == rows && (max_j + 1) as usize == cols && cols != rows;

    let mut table: Vec<Vec<Option<Vector2<Real>>>> = vec![vec![None; cols]; rows];
    for ((i, j), p) in labelled {
        let (c, r) = if transposed { (j, i) } else { (i, j) };
        if c < 0 || r < 0 || c as usize >= cols || r as usize >= rows {
            return None;
        }
        table[r as usize][c as usize] = Some(p);
    }

    table
        .into_iter()
        .map(|row| row.into_iter().collect::<Option<Vec<_>>>())
        .collect()
}

fn raster_order(mut table: Vec<Vec<Vector2<Real>>>, pattern: &ChessboardPattern) -> Vec<Pt2> {
    let last_c = pattern.cols - 1;
    let last_r = pattern.rows - 1;
    let col_step = (table[0][last_c] - table[0][0]) + (table[last_r][last_c] - table[last_r][0]);
    if col_step.x < 0.0 {
        table.iter_mut().for_each(|row| row.reverse());
    }
    let col_step = (table[0][last_c] - table[0][0]) + (table[last_r][last_c] - table[last_r][0]);
    let row_step = (table[last_r][0] - table[0][0]) + (table[last_r][last_c] - table[0][last_c]);
    if col_step.x * row_step.y - col_step.y * row_step.x < 0.0 {
        table.reverse();
    }

    table
        .into_iter()
        .flatten()
        .map(|p| Pt2::new(p.x, p.y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::render_chessboard;
    use fusion_core::{BrownConrady5, Camera, FxFyCxCySkew, Iso3};
    use nalgebra::{Translation3, UnitQuaternion, Vector3};

    fn camera() -> fusion_core::PinholeCamera {
        Camera::new(
            FxFyCxCySkew {
                fx: 600.0,
                fy: 600.0,
                cx: 320.0,
                cy: 240.0,
                skew: 0.0,
            },
            BrownConrady5::zero(8),
        )
    }

    fn pose(roll: Real) -> Iso3 {
        let pattern = pattern();
        let center = Vector3::new(
            (pattern.cols - 1) as Real * pattern.square_size * 0.5,
            (pattern.rows - 1) as Real * pattern.square_size * 0.5,
            0.0,
        );
        let rot = UnitQuaternion::from_scaled_axis(Vector3::new(0.15, -0.1, roll));
        Iso3::from_parts(Translation3::from(Vector3::new(0.0, 0.0, 0.4) - rot * center), rot)
    }

    fn pattern() -> ChessboardPattern {
        ChessboardPattern {
            cols: 7,
            rows: 5,
            square_size: 0.03,
        }
    }

    fn expected(pose: &Iso3) -> Vec<Vector2<Real>> {
        let cam = camera();
        pattern()
            .object_points()
            .iter()
            .map(|p| cam.project_point(&pose.transform_point(p)).unwrap())
            .collect()
    }

    fn assert_matches(found: &[Pt2], truth: &[Vector2<Real>], tol: Real) {
        assert_eq!(found.len(), truth.len());
        for (i, (f, t)) in found.iter().zip(truth).enumerate() {
            assert!((f.coords - t).norm() < tol, "corner {i}: {f:?} vs {t:?}");
        }
    }

    #[test]
    fn detects_board_in_raster_order() {
        let pose = pose(0.05);
        let img = render_chessboard(&camera(), &pose, &pattern(), 640, 480);
        let corners =
            detect_chessboard(&img, &pattern(), &ChessboardParams::default()).expect("board");
        assert_matches(&corners, &expected(&pose), 1.0);
    }

    #[test]
    fn upside_down_board_is_relabelled_from_the_top_left() {
        let pose = pose(std::f64::consts::PI + 0.05);
        let img = render_chessboard(&camera(), &pose, &pattern(), 640, 480);
        let corners =
            detect_chessboard(&img, &pattern(), &ChessboardParams::default()).expect("board");
        let mut truth = expected(&pose);
        truth.reverse();
        assert_matches(&corners, &truth, 1.0);
    }

    #[test]
    fn blank_image_has_no_board() {
        let img = GrayImage::from_pixel(120, 90, image::Luma([255]));
        assert!(detect_chessboard(&img, &pattern(), &ChessboardParams::default()).is_none());
    }

    #[test]
    fn wrong_pattern_size_is_not_detected() {
        let pose = pose(0.0);
        let img = render_chessboard(&camera(), &pose, &pattern(), 640, 480);
        let bigger = ChessboardPattern {
            cols: 10,
            rows: 8,
            square_size: 0.03,
        };
        assert!(detect_chessboard(&img, &bigger, &ChessboardParams::default()).is_none());
    }

    #[test]
    fn transposed_mirrored_labels_are_put_back_in_raster_order() {
        // 3 x 2 board at x = 10 + 20c, y = 50 + 20r, labelled with i running
        // down the image and j running right to left.
        let pattern = ChessboardPattern {
            cols: 3,
            rows: 2,
            square_size: 1.0,
        };
        let mut corners = Vec::new();
        for r in 0..2 {
            for c in 0..3 {
                let p = Vector2::new(10.0 + 20.0 * c as Real, 50.0 + 20.0 * r as Real);
                corners.push(((r, 2 - c), p));
            }
        }
        let table = lattice_table(corners, &pattern).expect("complete");
        let ordered = raster_order(table, &pattern);
        let expected: Vec<Pt2> = (0..2)
            .flat_map(|r| {
                (0..3).map(move |c| Pt2::new(10.0 + 20.0 * c as Real, 50.0 + 20.0 * r as Real))
            })
            .collect();
        assert_eq!(ordered, expected);
    }

    #[test]
    fn missing_lattice_cell_rejects_the_board() {
        let pattern = ChessboardPattern {
            cols: 2,
            rows: 2,
            square_size: 1.0,
        };
        let corners = vec![
            ((0, 0), Vector2::new(0.0, 0.0)),
            ((1, 0), Vector2::new(10.0, 0.0)),
            ((0, 1), Vector2::new(0.0, 10.0)),
        ];
        assert!(lattice_table(corners, &pattern).is_none());
    }
}
