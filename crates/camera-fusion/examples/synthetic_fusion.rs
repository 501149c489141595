//! All three workflows on synthetic data.
//!
//! 1. Calibrate a camera from rendered chessboard views
//! 2. Fuse two shifted frames into a mosaic
//! 3. Solve a LiDAR-to-image projection from six labeled pairs
//!
//! Run with: `cargo run -p camera-fusion --example synthetic_fusion`

use anyhow::Result;
use camera_fusion::imgproc::chessboard::ChessboardPattern;
use camera_fusion::prelude::*;
use camera_fusion::projection::{project_points, solve_projection};
use camera_fusion::synthetic::{planar, render_chessboard, textured_scene};
use image::DynamicImage;

fn main() -> Result<()> {
    println!("=== Intrinsic calibration ===");
    let cam_gt = Camera::new(
        FxFyCxCySkew {
            fx: 520.0,
            fy: 515.0,
            cx: 322.0,
            cy: 238.0,
            skew: 0.0,
        },
        BrownConrady5 {
            k1: -0.15,
            k2: 0.03,
            k3: 0.0,
            p1: 0.0,
            p2: 0.0,
            iters: 8,
        },
    );
    let pattern = ChessboardPattern {
        cols: 8,
        rows: 6,
        square_size: 0.025,
    };
    let board_w = (pattern.cols - 1) as f64 * pattern.square_size;
    let board_h = (pattern.rows - 1) as f64 * pattern.square_size;
    let images: Vec<_> = planar::poses_tilted(5, board_w, board_h, 0.4, 0.3)
        .iter()
        .enumerate()
        .map(|(i, pose)| (format!("view{i}"), render_chessboard(&cam_gt, pose, &pattern, 640, 480)))
        .collect();

    let calibrator = IntrinsicCalibrator::new(CalibrationConfig {
        pattern,
        fix_k3: true,
        ..CalibrationConfig::default()
    });
    let calibration = calibrator.calibrate_images(&images)?;
    let k = calibration.k_matrix();
    println!(
        "  fx={:.1} fy={:.1} cx={:.1} cy={:.1} (truth 520.0 515.0 322.0 238.0)",
        k[(0, 0)],
        k[(1, 1)],
        k[(0, 2)],
        k[(1, 2)]
    );
    println!("  k1={:.4} (truth -0.1500), rms {:.4} px", calibration.dist_coeffs[0], calibration.rms);
    for view in &calibration.views {
        println!("  {}: rms {:.4} px", view.name, view.stats.rms);
    }

    println!("\n=== Two-frame fusion ===");
    let (left, right) = textured_scene(320, 240, (40, 12), 7);
    let left = DynamicImage::ImageLuma8(left).to_rgb8();
    let right = DynamicImage::ImageLuma8(right).to_rgb8();
    let ideal = CameraCalibration {
        image_width: 320,
        image_height: 240,
        camera_matrix: [[300.0, 0.0, 159.5], [0.0, 300.0, 119.5], [0.0, 0.0, 1.0]],
        dist_coeffs: [0.0; 5],
        rms: 0.0,
        views: Vec::new(),
        attempted: 0,
        detected: 0,
    };
    let out = fuse_two_frames(&left, &right, &ideal, &ideal, None, &PipelineConfig::default())?;
    println!(
        "  {} matches, {} inliers, mosaic {}x{}",
        out.matches,
        out.inliers,
        out.mosaic.width(),
        out.mosaic.height()
    );
    println!("  H = {:.3}", out.homography);

    println!("\n=== LiDAR projection ===");
    let lidar_to_pixel = |p: [Real; 3]| [600.0 * p[0] / p[2] + 320.0, 600.0 * p[1] / p[2] + 240.0];
    let points = vec![
        [0.0, 0.0, 5.0],
        [1.0, 0.3, 6.0],
        [-1.1, 0.4, 7.5],
        [0.5, -0.6, 4.0],
        [-0.4, -0.2, 9.0],
        [0.8, 0.7, 5.5],
    ];
    let set = CorrespondenceSet {
        pixels: points.iter().copied().map(lidar_to_pixel).collect(),
        points,
    };
    let p = solve_projection(&set)?;
    let held_out = Pt3::new(0.2, 0.1, 6.3);
    let pixels = project_points(&p, &[held_out])?;
    println!(
        "  held-out point -> {:?} (truth {:?})",
        pixels[0],
        lidar_to_pixel([0.2, 0.1, 6.3])
    );

    Ok(())
}
