pub mod feature_matching;
pub mod matching;
#[cfg(feature = "camera")]
pub mod opencv_backend;
pub mod optical_flow;
pub mod preprocess;

use std::{fmt, str::FromStr};

use image::RgbImage;

use crate::util::error::AppError;

use self::{
    feature_matching::{FeatureMatchingEstimator, KeypointExtractor},
    optical_flow::{DenseFlow, OpticalFlowEstimator},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimationMethod {
    FeatureMatching,
    OpticalFlow,
}

impl EstimationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimationMethod::FeatureMatching => "feature_matching",
            EstimationMethod::OpticalFlow => "optical_flow",
        }
    }
}

impl FromStr for EstimationMethod {
    type Err = AppError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "feature_matching" => Ok(EstimationMethod::FeatureMatching),
            "optical_flow" => Ok(EstimationMethod::OpticalFlow),
            other => Err(AppError::UnknownEstimationMethod(other.to_string())),
        }
    }
}

impl fmt::Display for EstimationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lateral velocity from consecutive camera frames.
pub enum VelocityEstimator {
    FeatureMatching(FeatureMatchingEstimator),
    OpticalFlow(OpticalFlowEstimator),
}

impl VelocityEstimator {
    pub fn feature_matching(extractor: Box<dyn KeypointExtractor>) -> Self {
        VelocityEstimator::FeatureMatching(FeatureMatchingEstimator::new(extractor))
    }

    pub fn optical_flow(flow: Box<dyn DenseFlow>) -> Self {
        VelocityEstimator::OpticalFlow(OpticalFlowEstimator::new(flow))
    }

    /// Estimator for `method` backed by OpenCV.
    #[cfg(feature = "camera")]
    pub fn from_method(method: EstimationMethod) -> Result<Self, AppError> {
        use self::opencv_backend::{FarnebackFlow, OrbExtractor};

        Ok(match method {
            EstimationMethod::FeatureMatching => {
                Self::feature_matching(Box::new(OrbExtractor::new()?))
            }
            EstimationMethod::OpticalFlow => Self::optical_flow(Box::new(FarnebackFlow::default())),
        })
    }

    pub fn method(&self) -> EstimationMethod {
        match self {
            VelocityEstimator::FeatureMatching(_) => EstimationMethod::FeatureMatching,
            VelocityEstimator::OpticalFlow(_) => EstimationMethod::OpticalFlow,
        }
    }

    /// `None` until two frames have been seen, or when the frames give no
    /// usable motion. Backend failures are logged and also yield `None`.
    pub fn estimate_velocity(&mut self, image: &RgbImage) -> Option<f64> {
        let outcome = match self {
            VelocityEstimator::FeatureMatching(estimator) => estimator.estimate_velocity(image),
            VelocityEstimator::OpticalFlow(estimator) => estimator.estimate_velocity(image),
        };
        match outcome {
            Ok(velocity) => velocity,
            Err(error) => {
                log::warn!("{} estimation failed: {error}", self.method());
                None
            }
        }
    }

    pub fn reset(&mut self) {
        match self {
            VelocityEstimator::FeatureMatching(estimator) => estimator.reset(),
            VelocityEstimator::OpticalFlow(estimator) => estimator.reset(),
        }
    }

    pub fn has_previous_frame(&self) -> bool {
        match self {
            VelocityEstimator::FeatureMatching(estimator) => estimator.has_previous_frame(),
            VelocityEstimator::OpticalFlow(estimator) => estimator.has_previous_frame(),
        }
    }
}
