use crate::config::CalibrationConfig;
use crate::json::{read_json, write_json};
use fusion_core::{
    BrownConrady5, Camera, CorrespondenceView, FusionError, FxFyCxCySkew, Iso3, Mat3,
    PinholeCamera, Pt2, Real, ReprojectionStats,
};
use fusion_imgproc::{
    detect_chessboard, io, refine_corners_subpix,
    remap::{optimal_new_camera_matrix, Roi, UndistortMap},
    ImageF32,
};
use fusion_linear::{
    distortion_fit::DistortionFitOptions,
    iterative_intrinsics::{estimate_intrinsics_iterative, IterativeIntrinsicsOptions},
    PlanarPoseSolver,
};
use fusion_optim::{
    backend_lm::LmBackend,
    planar_intrinsics::{refine_planar_intrinsics, DistortionMask, PlanarIntrinsicsProblem},
};
use image::{GrayImage, ImageBuffer, Pixel};
use log::{debug, info, warn};
use nalgebra::{Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::path::Path;

const MIN_VIEWS: usize = 3;
const DISTORTION_ITERS: u32 = 8;

/// Residuals and board pose of one accepted calibration image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewReport {
    pub name: String,
    pub stats: ReprojectionStats,
    /// Board-to-camera rotation as an axis-angle vector.
    pub rvec: [Real; 3],
    /// Board-to-camera translation in board units.
    pub tvec: [Real; 3],
}

impl ViewReport {
    pub fn pose(&self) -> Iso3 {
        Iso3::from_parts(
            Translation3::from(Vector3::from(self.tvec)),
            UnitQuaternion::from_scaled_axis(Vector3::from(self.rvec)),
        )
    }
}

/// Intrinsics of one camera, computed once and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub image_width: u32,
    pub image_height: u32,
    /// Row-major 3×3 calibration matrix.
    pub camera_matrix: [[Real; 3]; 3],
    /// Brown-Conrady coefficients `k1, k2, p1, p2, k3`.
    pub dist_coeffs: [Real; 5],
    /// Reprojection RMS over all accepted views, in pixels.
    pub rms: Real,
    pub views: Vec<ViewReport>,
    /// Images examined.
    pub attempted: usize,
    /// Images with a detected board.
    pub detected: usize,
}

impl CameraCalibration {
    fn from_camera(
        camera: &PinholeCamera,
        image_size: (u32, u32),
        rms: Real,
        views: Vec<ViewReport>,
        attempted: usize,
    ) -> Self {
        let k = camera.k.k_matrix();
        Self {
            image_width: image_size.0,
            image_height: image_size.1,
            camera_matrix: std::array::from_fn(|r| std::array::from_fn(|c| k[(r, c)])),
            dist_coeffs: camera.dist.coeffs(),
            rms,
            detected: views.len(),
            views,
            attempted,
        }
    }

    pub fn k_matrix(&self) -> Mat3 {
        Mat3::from_fn(|r, c| self.camera_matrix[r][c])
    }

    pub fn camera(&self) -> PinholeCamera {
        Camera::new(
            FxFyCxCySkew::from_k_matrix(&self.k_matrix()),
            BrownConrady5::from_coeffs(self.dist_coeffs, DISTORTION_ITERS),
        )
    }

    /// Adjusted camera matrix (alpha = 0) and valid rectangle for images of
    /// `width × height`.
    pub fn optimal_new_camera_matrix(&self, width: u32, height: u32) -> Result<(Mat3, Roi), FusionError> {
        let (k, roi) = optimal_new_camera_matrix(&self.camera(), width, height)?;
        Ok((k.k_matrix(), roi))
    }

    pub fn undistort_map(&self, width: u32, height: u32) -> Result<UndistortMap, FusionError> {
        UndistortMap::new(&self.camera(), width, height)
    }

    /// Remove lens distortion, cropping to the valid pixel rectangle.
    pub fn undistort<P>(&self, img: &ImageBuffer<P, Vec<u8>>) -> Result<ImageBuffer<P, Vec<u8>>, FusionError>
    where
        P: Pixel<Subpixel = u8>,
    {
        self.undistort_map(img.width(), img.height())?.apply(img)
    }

    pub fn load(path: &Path) -> Result<Self, FusionError> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), FusionError> {
        write_json(path, self)
    }
}

/// Chessboard intrinsic calibration over a set of images.
#[derive(Debug, Clone, Default)]
pub struct IntrinsicCalibrator {
    pub config: CalibrationConfig,
}

impl IntrinsicCalibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// Sub-pixel chessboard corners in raster order, if the board is found.
    pub fn detect(&self, img: &GrayImage) -> Option<Vec<Pt2>> {
        let mut corners = detect_chessboard(img, &self.config.pattern, &self.config.detector)?;
        let gray = ImageF32::from_gray(img);
        refine_corners_subpix(&gray, &mut corners, &self.config.subpix);
        Some(corners)
    }

    /// Calibrate from every `jpg`/`jpeg`/`png` in `dir`, in file-name order.
    ///
    /// # Errors
    ///
    /// `Acquisition` for an unreadable directory or image, `Calibration` when
    /// too few images contain the board.
    pub fn calibrate_dir(&self, dir: &Path) -> Result<CameraCalibration, FusionError> {
        let paths = io::list_images(dir)?;
        info!("calibrating from {} images in {}", paths.len(), dir.display());
        let images = paths
            .iter()
            .map(|p| {
                let name = p
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                io::load_gray(p).map(|img| (name, img))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.calibrate_images(&images)
    }

    /// Calibrate from named in-memory images; images without a board are skipped.
    pub fn calibrate_images(&self, images: &[(String, GrayImage)]) -> Result<CameraCalibration, FusionError> {
        let attempted = images.len();
        let object_points = self.config.pattern.object_points();
        let mut image_size: Option<(u32, u32)> = None;
        let mut names = Vec::new();
        let mut views = Vec::new();

        for (name, img) in images {
            let Some(corners) = self.detect(img) else {
                debug!("{name}: no chessboard");
                continue;
            };
            if corners.len() != object_points.len() {
                return Err(FusionError::Calibration {
                    reason: format!(
                        "{name}: detected {} corners, pattern has {}",
                        corners.len(),
                        object_points.len()
                    ),
                    attempted,
                    detected: views.len(),
                });
            }
            match image_size {
                None => image_size = Some(img.dimensions()),
                Some(size) if size != img.dimensions() => {
                    return Err(FusionError::Calibration {
                        reason: format!(
                            "{name} is {}x{}, earlier images are {}x{}",
                            img.width(),
                            img.height(),
                            size.0,
                            size.1
                        ),
                        attempted,
                        detected: views.len(),
                    });
                }
                Some(_) => {}
            }
            views.push(CorrespondenceView {
                points_3d: object_points.clone(),
                points_2d: corners,
            });
            names.push(name.clone());
        }

        info!("chessboard found in {} of {} images", views.len(), attempted);
        let Some(size) = image_size else {
            return Err(FusionError::Calibration {
                reason: "no chessboard detected".into(),
                attempted,
                detected: 0,
            });
        };
        if views.len() < MIN_VIEWS {
            return Err(FusionError::Calibration {
                reason: format!("need at least {MIN_VIEWS} views with a chessboard"),
                attempted,
                detected: views.len(),
            });
        }
        self.calibrate_views(&names, views, size, attempted)
    }

    /// Linear initialisation followed by joint refinement of intrinsics,
    /// distortion and per-view poses.
    pub fn calibrate_views(
        &self,
        names: &[String],
        views: Vec<CorrespondenceView>,
        image_size: (u32, u32),
        attempted: usize,
    ) -> Result<CameraCalibration, FusionError> {
        let cfg = &self.config;
        let init = estimate_intrinsics_iterative(
            &views,
            IterativeIntrinsicsOptions {
                iterations: cfg.init_iterations,
                distortion_opts: DistortionFitOptions {
                    fix_tangential: cfg.fix_tangential,
                    fix_k3: cfg.fix_k3,
                    iters: DISTORTION_ITERS,
                },
                zero_skew: true,
            },
        )?;
        let k = init.intrinsics.k_matrix();
        let poses = init
            .homographies
            .iter()
            .map(|h| PlanarPoseSolver::from_homography(&k, h))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "linear init: fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
            init.intrinsics.fx, init.intrinsics.fy, init.intrinsics.cx, init.intrinsics.cy
        );

        let problem = PlanarIntrinsicsProblem::new(views)?
            .with_kernel(cfg.robust_kernel)
            .with_mask(DistortionMask {
                fix_k3: cfg.fix_k3,
                fix_tangential: cfg.fix_tangential,
            });
        let init_camera = Camera::new(init.intrinsics, init.distortion);
        let est = refine_planar_intrinsics(&LmBackend, problem, &init_camera, &poses, &cfg.solver)?;
        if !est.report.converged() {
            warn!(
                "calibration solver stopped early ({:?})",
                est.report.termination
            );
        }
        info!(
            "calibration rms {:.4} px; fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
            est.rms, est.camera.k.fx, est.camera.k.fy, est.camera.k.cx, est.camera.k.cy
        );

        let reports = est
            .per_view
            .iter()
            .zip(&est.poses)
            .enumerate()
            .map(|(i, (stats, pose))| ViewReport {
                name: names.get(i).cloned().unwrap_or_else(|| format!("view{i}")),
                stats: *stats,
                rvec: pose.rotation.scaled_axis().into(),
                tvec: pose.translation.vector.into(),
            })
            .collect();
        Ok(CameraCalibration::from_camera(
            &est.camera,
            image_size,
            est.rms,
            reports,
            attempted,
        ))
    }
}
