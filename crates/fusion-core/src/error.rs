use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by calibration, matching, estimation and projection.
///
/// Failures are local to one camera or one image pair and carry the counts
/// needed to diagnose them.
#[derive(Debug, Error)]
pub enum FusionError {
    /// Missing or unreadable image / correspondence file.
    #[error("cannot read {}: {reason}", path.display())]
    Acquisition { path: PathBuf, reason: String },

    /// Chessboard calibration could not proceed.
    #[error("calibration failed: {reason} (detected {detected} of {attempted} images)")]
    Calibration {
        reason: String,
        attempted: usize,
        detected: usize,
    },

    /// Not enough data or no consensus for a model.
    #[error("estimation failed: {0}")]
    Estimation(String),

    /// Near-singular system, vanishing homogeneous divisor or SVD failure.
    #[error("numerical degeneracy: {0}")]
    NumericalDegeneracy(String),
}

impl FusionError {
    pub fn acquisition(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::Acquisition {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn estimation(msg: impl Into<String>) -> Self {
        Self::Estimation(msg.into())
    }

    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::NumericalDegeneracy(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_error_reports_counts() {
        let err = FusionError::Calibration {
            reason: "no chessboard found".into(),
            attempted: 12,
            detected: 0,
        };
        let msg = err.to_string();
        assert!(msg.contains("detected 0 of 12"), "{msg}");
    }
}
