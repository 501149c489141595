//! Two views related by a known translation: matching, then robust homography.

use fusion_core::{homography_distance, Mat3, RansacOptions};
use fusion_features::{FeatureMatcher, MatcherConfig};
use fusion_imgproc::synthetic::textured_scene;
use fusion_linear::HomographyEstimator;
use rand::{rngs::StdRng, SeedableRng};
use std::collections::HashSet;

const SHIFT: (u32, u32) = (23, 11);

#[test]
fn matches_are_one_to_one_and_inliers_follow_the_shift() {
    let (img1, img2) = textured_scene(200, 150, SHIFT, 5);
    let res = FeatureMatcher::new(MatcherConfig::default()).match_images(&img1, &img2);
    assert!(res.matches.len() >= 20, "only {} matches", res.matches.len());

    let firsts: HashSet<_> = res.matches.iter().map(|m| m.index1).collect();
    let seconds: HashSet<_> = res.matches.iter().map(|m| m.index2).collect();
    assert_eq!(firsts.len(), res.matches.len());
    assert_eq!(seconds.len(), res.matches.len());
    assert!(res.matches.windows(2).all(|w| w[0].index1 < w[1].index1));

    let (p1, p2) = res.point_pairs();
    let mut rng = StdRng::seed_from_u64(42);
    let est = HomographyEstimator::new(RansacOptions {
        thresh: 0.5,
        ..RansacOptions::default()
    })
    .estimate(&p2, &p1, &mut rng)
    .expect("homography");
    assert!(est.inliers.len() >= 20, "only {} inliers", est.inliers.len());
    for &i in &est.inliers {
        assert_eq!(p1[i].x, p2[i].x + SHIFT.0 as f64, "inlier {i}");
        assert_eq!(p1[i].y, p2[i].y + SHIFT.1 as f64, "inlier {i}");
    }
}

#[test]
fn homography_from_matches_is_the_translation() {
    let (img1, img2) = textured_scene(200, 150, SHIFT, 5);
    let res = FeatureMatcher::default().match_images(&img1, &img2);
    let (p1, p2) = res.point_pairs();

    let mut rng = StdRng::seed_from_u64(42);
    let est = HomographyEstimator::new(RansacOptions {
        thresh: 1.0,
        ..RansacOptions::default()
    })
    .estimate(&p2, &p1, &mut rng)
    .expect("homography");

    let truth = Mat3::new(
        1.0,
        0.0,
        SHIFT.0 as f64,
        0.0,
        1.0,
        SHIFT.1 as f64,
        0.0,
        0.0,
        1.0,
    );
    let d = homography_distance(&est.h, &truth).unwrap();
    assert!(d < 1e-6, "distance {d}, h = {}", est.h);
    assert!(est
        .best_inlier_history
        .windows(2)
        .all(|w| w[0] <= w[1]));
}
