use image::{GrayImage, RgbImage};

use super::{
    matching::{
        BruteForceHamming, Correspondence, Descriptor, DescriptorMatcher, FilterChain, Keypoint,
        MatchFilter, NormalizedPoint,
    },
    preprocess::{working_grayscale, Downsampling},
};
use crate::{
    config::constants::{FOCAL_LENGTH_PX, WORKING_HEIGHT, WORKING_WIDTH},
    util::error::AppError,
};

/// Keypoints with one descriptor each, index aligned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

pub trait KeypointExtractor: Send {
    fn extract(&mut self, image: &GrayImage) -> Result<Features, AppError>;
}

/// Pinhole intrinsics with square pixels and no skew.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub focal_length: f64,
    pub center_x: f64,
    pub center_y: f64,
}

impl CameraIntrinsics {
    pub fn for_image(width: u32, height: u32, focal_length: f64) -> Self {
        CameraIntrinsics {
            focal_length,
            center_x: (width / 2) as f64,
            center_y: (height / 2) as f64,
        }
    }

    pub fn normalize(&self, keypoint: &Keypoint) -> NormalizedPoint {
        NormalizedPoint {
            x: (keypoint.x as f64 - self.center_x) / self.focal_length,
            y: (keypoint.y as f64 - self.center_y) / self.focal_length,
        }
    }
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self::for_image(WORKING_WIDTH, WORKING_HEIGHT, FOCAL_LENGTH_PX)
    }
}

pub struct FeatureFrame {
    pub points: Vec<NormalizedPoint>,
    pub descriptors: Vec<Descriptor>,
}

impl FeatureFrame {
    pub fn new(features: Features, intrinsics: &CameraIntrinsics) -> Result<Self, AppError> {
        if features.keypoints.len() != features.descriptors.len() {
            return Err(AppError::Estimation(format!(
                "{} keypoints but {} descriptors",
                features.keypoints.len(),
                features.descriptors.len()
            )));
        }
        Ok(FeatureFrame {
            points: features.keypoints.iter().map(|kp| intrinsics.normalize(kp)).collect(),
            descriptors: features.descriptors,
        })
    }
}

pub struct FeatureMatchingEstimator {
    extractor: Box<dyn KeypointExtractor>,
    matcher: Box<dyn DescriptorMatcher>,
    filters: FilterChain,
    intrinsics: CameraIntrinsics,
    working_size: (u32, u32),
    previous_frame: Option<FeatureFrame>,
}

impl FeatureMatchingEstimator {
    pub fn new(extractor: Box<dyn KeypointExtractor>) -> Self {
        FeatureMatchingEstimator {
            extractor,
            matcher: Box::new(BruteForceHamming),
            filters: FilterChain::default(),
            intrinsics: CameraIntrinsics::default(),
            working_size: (WORKING_WIDTH, WORKING_HEIGHT),
            previous_frame: None,
        }
    }

    pub fn with_matcher(mut self, matcher: Box<dyn DescriptorMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_intrinsics(mut self, intrinsics: CameraIntrinsics) -> Self {
        self.intrinsics = intrinsics;
        self
    }

    /// Mean horizontal displacement of matched keypoints between the stored
    /// frame and `image`, in normalized image coordinates. `image` always
    /// replaces the stored frame, even when nothing matched.
    pub fn estimate_velocity(&mut self, image: &RgbImage) -> Result<Option<f64>, AppError> {
        let previous = self.previous_frame.take();

        let (width, height) = self.working_size;
        let gray = working_grayscale(image, width, height, Downsampling::Linear);
        let current = FeatureFrame::new(self.extractor.extract(&gray)?, &self.intrinsics)?;

        let velocity = previous.and_then(|previous| {
            let correspondences = self.correspond(&previous, &current);
            mean_displacement(&correspondences)
        });
        self.previous_frame = Some(current);
        Ok(velocity)
    }

    fn correspond(&self, previous: &FeatureFrame, current: &FeatureFrame) -> Vec<Correspondence> {
        let candidates = self
            .matcher
            .knn_match(&previous.descriptors, &current.descriptors);

        let correspondences = candidates
            .into_iter()
            .filter_map(|candidates| {
                Some(Correspondence {
                    candidates,
                    query: *previous.points.get(candidates.best.query_index)?,
                    train: *current.points.get(candidates.best.train_index)?,
                })
            })
            .collect();
        self.filters.retain(correspondences)
    }

    pub fn reset(&mut self) {
        self.previous_frame = None;
    }

    pub fn has_previous_frame(&self) -> bool {
        self.previous_frame.is_some()
    }
}

fn mean_displacement(correspondences: &[Correspondence]) -> Option<f64> {
    if correspondences.is_empty() {
        return None;
    }
    let total: f64 = correspondences
        .iter()
        .map(Correspondence::horizontal_displacement)
        .sum();
    Some(total / correspondences.len() as f64)
}
