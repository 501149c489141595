use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fusion_core::{Pt3, Real};
use fusion_imgproc::io::{load_rgb, save_image};
use fusion_pipeline::{
    fuse_two_frames,
    json::{read_json, write_json},
    projection::{draw_projections, load_projection, project_points, save_projection, solve_projection},
    CameraCalibration, CorrespondenceSet, IntrinsicCalibrator, OverlapBorders, PipelineConfig,
};
use image::Rgb;
use log::info;

/// Offline camera calibration, two-frame fusion and LiDAR projection.
#[derive(Debug, Parser)]
#[command(author, version, about = "Camera/LiDAR calibration and fusion")]
struct Args {
    /// Optional path to a JSON PipelineConfig. Defaults are used if omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Calibrate one camera from a directory of chessboard images.
    Calibrate {
        #[arg(long)]
        images: PathBuf,
        /// Output CameraCalibration JSON.
        #[arg(long)]
        output: PathBuf,
    },
    /// Undistort, match and stitch a left and a right frame.
    Fuse {
        #[arg(long)]
        left: PathBuf,
        #[arg(long)]
        right: PathBuf,
        #[arg(long)]
        left_calibration: PathBuf,
        #[arg(long)]
        right_calibration: PathBuf,
        /// Left-frame columns before this one are ignored for matching.
        #[arg(long, requires = "right_border")]
        left_border: Option<u32>,
        /// Right-frame columns from this one on are ignored for matching.
        #[arg(long, requires = "left_border")]
        right_border: Option<u32>,
        /// Output mosaic image.
        #[arg(long)]
        output: PathBuf,
        /// Also write the right-to-left homography as JSON.
        #[arg(long)]
        homography: Option<PathBuf>,
    },
    /// Solve a projection matrix from six labeled correspondences.
    Dlt {
        /// CorrespondenceSet JSON.
        #[arg(long)]
        correspondences: PathBuf,
        /// Output projection matrix JSON.
        #[arg(long)]
        output: PathBuf,
    },
    /// Project sensor points into an image and draw them.
    Project {
        #[arg(long)]
        projection: PathBuf,
        /// JSON array of `[x, y, z]` points.
        #[arg(long)]
        points: PathBuf,
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 4)]
        radius: i64,
    },
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::load(p).with_context(|| format!("loading config {}", p.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn run_calibrate(images: &Path, output: &Path, config: &PipelineConfig) -> Result<CameraCalibration> {
    let calibration = IntrinsicCalibrator::new(config.calibration.clone())
        .calibrate_dir(images)
        .with_context(|| format!("calibrating from {}", images.display()))?;
    calibration.save(output)?;
    info!(
        "wrote {} (rms {:.4} px, {} of {} images)",
        output.display(),
        calibration.rms,
        calibration.detected,
        calibration.attempted
    );
    Ok(calibration)
}

struct FuseArgs<'a> {
    left: &'a Path,
    right: &'a Path,
    left_calibration: &'a Path,
    right_calibration: &'a Path,
    borders: Option<OverlapBorders>,
    output: &'a Path,
    homography: Option<&'a Path>,
}

fn run_fuse(args: FuseArgs<'_>, config: &PipelineConfig) -> Result<()> {
    let left = load_rgb(args.left)?;
    let right = load_rgb(args.right)?;
    let left_cal = CameraCalibration::load(args.left_calibration)?;
    let right_cal = CameraCalibration::load(args.right_calibration)?;

    let out = fuse_two_frames(&left, &right, &left_cal, &right_cal, args.borders, config)
        .context("fusing frames")?;
    save_image(&out.mosaic, args.output)?;
    if let Some(path) = args.homography {
        let rows: [[Real; 3]; 3] =
            std::array::from_fn(|r| std::array::from_fn(|c| out.homography[(r, c)]));
        write_json(path, &rows)?;
    }
    info!(
        "wrote {}x{} mosaic to {}",
        out.mosaic.width(),
        out.mosaic.height(),
        args.output.display()
    );
    Ok(())
}

fn run_dlt(correspondences: &Path, output: &Path) -> Result<()> {
    let set = CorrespondenceSet::load(correspondences)?;
    let p = solve_projection(&set)
        .with_context(|| format!("solving projection from {}", correspondences.display()))?;
    save_projection(output, &p)?;
    Ok(())
}

fn run_project(
    projection: &Path,
    points: &Path,
    image: &Path,
    output: &Path,
    radius: i64,
) -> Result<Vec<(i64, i64)>> {
    let p = load_projection(projection)?;
    let points: Vec<[Real; 3]> = read_json(points)?;
    let points: Vec<Pt3> = points.iter().map(|p| Pt3::new(p[0], p[1], p[2])).collect();
    let pixels = project_points(&p, &points).context("projecting points")?;

    let mut img = load_rgb(image)?;
    draw_projections(&mut img, &pixels, radius, Rgb([255, 0, 0]));
    save_image(&img, output)?;
    Ok(pixels)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    match args.command {
        Command::Calibrate { images, output } => {
            run_calibrate(&images, &output, &config)?;
        }
        Command::Fuse {
            left,
            right,
            left_calibration,
            right_calibration,
            left_border,
            right_border,
            output,
            homography,
        } => {
            let borders = left_border
                .zip(right_border)
                .map(|(left, right)| OverlapBorders { left, right });
            run_fuse(
                FuseArgs {
                    left: &left,
                    right: &right,
                    left_calibration: &left_calibration,
                    right_calibration: &right_calibration,
                    borders,
                    output: &output,
                    homography: homography.as_deref(),
                },
                &config,
            )?;
        }
        Command::Dlt {
            correspondences,
            output,
        } => run_dlt(&correspondences, &output)?,
        Command::Project {
            projection,
            points,
            image,
            output,
            radius,
        } => {
            let pixels = run_project(&projection, &points, &image, &output, radius)?;
            println!("{}", serde_json::to_string(&pixels)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use fusion_core::FusionError;
    use image::RgbImage;

    #[test]
    fn command_line_is_well_formed() {
        Args::command().debug_assert();
        let args = Args::try_parse_from([
            "camera-fusion",
            "fuse",
            "--left",
            "l.png",
            "--right",
            "r.png",
            "--left-calibration",
            "l.json",
            "--right-calibration",
            "r.json",
            "--left-border",
            "10",
            "--output",
            "m.png",
        ]);
        assert!(args.is_err(), "a single border must be rejected");
    }

    #[test]
    fn dlt_then_project_smoke_test() {
        let dir = tempfile::tempdir().unwrap();
        let project = |p: [Real; 3]| [500.0 * p[0] / p[2] + 64.0, 500.0 * p[1] / p[2] + 48.0];
        let points = vec![
            [0.0, 0.0, 5.0],
            [0.3, 0.1, 6.0],
            [-0.4, 0.2, 4.0],
            [0.2, -0.3, 7.0],
            [-0.1, -0.2, 5.5],
            [0.35, 0.3, 4.5],
        ];
        let set = CorrespondenceSet {
            pixels: points.iter().copied().map(project).collect(),
            points,
        };
        let pairs = dir.path().join("pairs.json");
        set.save(&pairs).unwrap();
        let p_path = dir.path().join("p.json");
        run_dlt(&pairs, &p_path).unwrap();

        let held_out = dir.path().join("held_out.json");
        write_json(&held_out, &vec![[0.11, 0.07, 5.2]]).unwrap();
        let image = dir.path().join("frame.png");
        save_image(&RgbImage::new(128, 96), &image).unwrap();
        let output = dir.path().join("overlay.png");

        let pixels = run_project(&p_path, &held_out, &image, &output, 2).unwrap();
        let [u, v] = project([0.11, 0.07, 5.2]);
        assert_eq!(pixels, vec![(u as i64, v as i64)]);
        let overlay = load_rgb(&output).unwrap();
        assert_eq!(overlay.get_pixel(u as u32, v as u32), &Rgb([255, 0, 0]));
    }

    #[test]
    fn calibrating_an_empty_directory_fails_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_calibrate(dir.path(), &dir.path().join("cam.json"), &PipelineConfig::default())
            .unwrap_err();
        assert!(format!("{err:#}").contains("calibrating from"));
        assert!(matches!(
            err.downcast_ref::<FusionError>(),
            Some(FusionError::Calibration { detected: 0, .. })
        ));
    }
}
