use crate::brief::{BriefPattern, Keypoint};
use crate::matching::{match_descriptors, Match};
use fusion_core::Pt2;
use fusion_imgproc::{filter::gaussian_blur, harris_corners, HarrisParams, ImageF32};
use image::GrayImage;
use log::debug;
use serde::{Deserialize, Serialize};

/// Detection and matching parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Keep corners with response above `quality * max_response`.
    pub quality: f32,
    /// Lowe ratio: accept when `best < ratio * second_best`.
    pub ratio: f32,
    /// Require mutual nearest neighbours.
    pub cross_check: bool,
    pub nms_radius: usize,
    /// Strongest corners kept per image; 0 keeps all.
    pub max_keypoints: usize,
    pub harris_k: f32,
    pub harris_sigma: f32,
    /// Smoothing applied before sampling descriptors.
    pub descriptor_sigma: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            quality: 0.15,
            ratio: 0.8,
            cross_check: true,
            nms_radius: 3,
            max_keypoints: 2000,
            harris_k: 0.04,
            harris_sigma: 1.5,
            descriptor_sigma: 1.0,
        }
    }
}

/// Keypoints of both images and the accepted matches between them.
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    pub keypoints1: Vec<Keypoint>,
    pub keypoints2: Vec<Keypoint>,
    /// In order of `keypoints1`.
    pub matches: Vec<Match>,
}

impl MatchResult {
    /// Matched locations as `(image-1 points, image-2 points)`.
    pub fn point_pairs(&self) -> (Vec<Pt2>, Vec<Pt2>) {
        let at = |k: &Keypoint| Pt2::new(k.x as f64, k.y as f64);
        self.matches
            .iter()
            .map(|m| (at(&self.keypoints1[m.index1]), at(&self.keypoints2[m.index2])))
            .unzip()
    }
}

/// Harris + BRIEF + ratio-test matcher.
#[derive(Debug, Clone, Default)]
pub struct FeatureMatcher {
    pub config: MatcherConfig,
    pattern: BriefPattern,
}

impl FeatureMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            config,
            pattern: BriefPattern::default(),
        }
    }

    fn harris_params(&self) -> HarrisParams {
        HarrisParams {
            k: self.config.harris_k,
            sigma: self.config.harris_sigma,
            quality: self.config.quality,
            nms_radius: self.config.nms_radius,
            max_corners: self.config.max_keypoints,
        }
    }

    /// Detect and describe keypoints; corners too close to the border are dropped.
    pub fn detect(&self, img: &GrayImage) -> Vec<Keypoint> {
        let gray = ImageF32::from_gray(img);
        let corners = harris_corners(&gray, &self.harris_params());
        let smoothed = gaussian_blur(&gray, self.config.descriptor_sigma);
        self.pattern.compute(&smoothed, &corners)
    }

    pub fn match_images(&self, img1: &GrayImage, img2: &GrayImage) -> MatchResult {
        let keypoints1 = self.detect(img1);
        let keypoints2 = self.detect(img2);
        let d1: Vec<_> = keypoints1.iter().map(|k| k.descriptor).collect();
        let d2: Vec<_> = keypoints2.iter().map(|k| k.descriptor).collect();
        let matches = match_descriptors(&d1, &d2, self.config.ratio, self.config.cross_check);
        debug!(
            "matched {} of {} / {} keypoints",
            matches.len(),
            keypoints1.len(),
            keypoints2.len()
        );
        MatchResult {
            keypoints1,
            keypoints2,
            matches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_imgproc::synthetic::textured_scene;

    #[test]
    fn config_json_fills_defaults() {
        let cfg: MatcherConfig = serde_json::from_str(r#"{"ratio": 0.7}"#).unwrap();
        assert_eq!(cfg.ratio, 0.7);
        assert_eq!(cfg.quality, 0.15);
        assert!(cfg.cross_check);
    }

    #[test]
    fn identical_images_match_every_keypoint_to_itself() {
        let (img, _) = textured_scene(120, 90, (0, 0), 3);
        let res = FeatureMatcher::default().match_images(&img, &img);
        assert!(!res.keypoints1.is_empty());
        assert_eq!(res.matches.len(), res.keypoints1.len());
        assert!(res
            .matches
            .iter()
            .all(|m| m.index1 == m.index2 && m.distance == 0));
    }
}
