use image::GrayImage;
use ndarray::Array2;
use opencv::{
    core::{KeyPoint, Mat, Ptr, Scalar, Vec2f, Vector, CV_8UC1},
    features2d::{ORB_ScoreType, ORB},
    prelude::*,
    video,
};

use super::{
    feature_matching::{Features, KeypointExtractor},
    matching::{Descriptor, Keypoint},
    optical_flow::DenseFlow,
};
use crate::{config::constants::ORB_MAX_FEATURES, util::error::AppError};

fn backend_error(error: opencv::Error) -> AppError {
    AppError::Estimation(error.to_string())
}

pub fn gray_to_mat(image: &GrayImage) -> Result<Mat, AppError> {
    let mut mat = Mat::new_rows_cols_with_default(
        image.height() as i32,
        image.width() as i32,
        CV_8UC1,
        Scalar::all(0.0),
    )
    .map_err(backend_error)?;
    mat.data_bytes_mut()
        .map_err(backend_error)?
        .copy_from_slice(image.as_raw());
    Ok(mat)
}

pub struct OrbExtractor {
    orb: Ptr<ORB>,
}

impl OrbExtractor {
    pub fn new() -> Result<Self, AppError> {
        let orb = ORB::create(
            ORB_MAX_FEATURES,
            1.2,
            8,
            31,
            0,
            2,
            ORB_ScoreType::HARRIS_SCORE,
            31,
            20,
        )
        .map_err(backend_error)?;
        Ok(OrbExtractor { orb })
    }
}

impl KeypointExtractor for OrbExtractor {
    fn extract(&mut self, image: &GrayImage) -> Result<Features, AppError> {
        let mat = gray_to_mat(image)?;
        let mut keypoints = Vector::<KeyPoint>::new();
        let mut descriptors = Mat::default();
        self.orb
            .detect_and_compute(&mat, &Mat::default(), &mut keypoints, &mut descriptors, false)
            .map_err(backend_error)?;

        let mut features = Features::default();
        // No keypoints leaves the descriptor matrix empty.
        if keypoints.is_empty() || descriptors.rows() == 0 {
            return Ok(features);
        }

        for (row, keypoint) in keypoints.iter().enumerate() {
            let bytes = descriptors.at_row::<u8>(row as i32).map_err(backend_error)?;
            let descriptor: Descriptor = bytes.try_into().map_err(|_| {
                AppError::Estimation(format!("expected 32 byte descriptors, got {}", bytes.len()))
            })?;
            let point = keypoint.pt();
            features.keypoints.push(Keypoint {
                x: point.x,
                y: point.y,
            });
            features.descriptors.push(descriptor);
        }
        Ok(features)
    }
}

/// Gunnar Farneback's polynomial expansion flow.
pub struct FarnebackFlow {
    pub pyramid_scale: f64,
    pub levels: i32,
    pub window_size: i32,
    pub iterations: i32,
    pub poly_n: i32,
    pub poly_sigma: f64,
}

impl Default for FarnebackFlow {
    fn default() -> Self {
        FarnebackFlow {
            pyramid_scale: 0.5,
            levels: 3,
            window_size: 10,
            iterations: 5,
            poly_n: 5,
            poly_sigma: 1.2,
        }
    }
}

impl DenseFlow for FarnebackFlow {
    fn horizontal_flow(
        &mut self,
        previous: &GrayImage,
        current: &GrayImage,
    ) -> Result<Array2<f32>, AppError> {
        let previous_mat = gray_to_mat(previous)?;
        let current_mat = gray_to_mat(current)?;
        let mut flow = Mat::default();
        video::calc_optical_flow_farneback(
            &previous_mat,
            &current_mat,
            &mut flow,
            self.pyramid_scale,
            self.levels,
            self.window_size,
            self.iterations,
            self.poly_n,
            self.poly_sigma,
            0,
        )
        .map_err(backend_error)?;

        let shape = (flow.rows() as usize, flow.cols() as usize);
        let horizontal: Vec<f32> = flow
            .data_typed::<Vec2f>()
            .map_err(backend_error)?
            .iter()
            .map(|vector| vector[0])
            .collect();
        Array2::from_shape_vec(shape, horizontal)
            .map_err(|error| AppError::Estimation(error.to_string()))
    }
}
