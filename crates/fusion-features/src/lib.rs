//! Feature detection and matching between two grayscale views.
//!
//! [`FeatureMatcher`] runs Harris detection, BRIEF description and a
//! Hamming nearest-neighbour search with ratio test (and optional
//! cross-check) on a pair of images.

pub mod brief;
mod matcher;
pub mod matching;

pub use brief::{BriefPattern, Descriptor, Keypoint};
pub use matcher::{FeatureMatcher, MatchResult, MatcherConfig};
pub use matching::{match_descriptors, Match};
