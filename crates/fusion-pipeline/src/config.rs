//! JSON configuration for every pipeline stage.
//!
//! Every struct is `#[serde(default)]`, so a config file only needs the
//! fields it changes.

use crate::json::{read_json, write_json};
use fusion_core::{FusionError, RansacOptions};
use fusion_features::MatcherConfig;
use fusion_imgproc::{chessboard::ChessboardPattern, ChessboardParams, SubPixCriteria};
use fusion_optim::{robust::RobustKernel, SolveOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Intrinsic calibration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub pattern: ChessboardPattern,
    pub detector: ChessboardParams,
    pub subpix: SubPixCriteria,
    /// Distortion / intrinsics alternation rounds of the linear initialisation.
    pub init_iterations: usize,
    pub solver: SolveOptions,
    pub robust_kernel: RobustKernel,
    /// Hold `k3` at zero.
    pub fix_k3: bool,
    /// Hold `p1`, `p2` at zero.
    pub fix_tangential: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            pattern: ChessboardPattern::default(),
            detector: ChessboardParams::default(),
            subpix: SubPixCriteria::default(),
            init_iterations: 2,
            solver: SolveOptions::default(),
            robust_kernel: RobustKernel::None,
            fix_k3: false,
            fix_tangential: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    /// Upper bound on either side of the mosaic canvas.
    pub max_canvas_side: u32,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            max_canvas_side: 16_384,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub calibration: CalibrationConfig,
    pub matcher: MatcherConfig,
    pub ransac: RansacOptions,
    pub stitch: StitchConfig,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, FusionError> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), FusionError> {
        write_json(path, self)
    }
}
