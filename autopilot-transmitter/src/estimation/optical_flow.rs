use image::{GrayImage, RgbImage};
use ndarray::{Array2, Zip};

use super::preprocess::{intensity_view, working_grayscale, Downsampling};
use crate::{
    config::constants::{
        BRIGHTNESS_THRESHOLD, DIRECTION_BALANCE_TOLERANCE, FLOW_MAGNITUDE_PERCENTILE,
        WORKING_HEIGHT, WORKING_WIDTH,
    },
    util::error::AppError,
};

/// Dense motion between two equally sized grayscale images. Returns the
/// horizontal component only, shaped `(height, width)`.
pub trait DenseFlow: Send {
    fn horizontal_flow(
        &mut self,
        previous: &GrayImage,
        current: &GrayImage,
    ) -> Result<Array2<f32>, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowFilterConfig {
    /// Pixels brighter than this are glare, their flow is zeroed.
    pub brightness_threshold: u8,
    /// Allowed distance of the positive share from one half before the
    /// minority direction is dropped.
    pub balance_tolerance: f64,
    /// Magnitude percentile a value must reach to be averaged.
    pub magnitude_percentile: f64,
}

impl Default for FlowFilterConfig {
    fn default() -> Self {
        FlowFilterConfig {
            brightness_threshold: BRIGHTNESS_THRESHOLD,
            balance_tolerance: DIRECTION_BALANCE_TOLERANCE,
            magnitude_percentile: FLOW_MAGNITUDE_PERCENTILE,
        }
    }
}

pub struct OpticalFlowEstimator {
    flow: Box<dyn DenseFlow>,
    filter: FlowFilterConfig,
    working_size: (u32, u32),
    previous_frame: Option<GrayImage>,
}

impl OpticalFlowEstimator {
    pub fn new(flow: Box<dyn DenseFlow>) -> Self {
        OpticalFlowEstimator {
            flow,
            filter: FlowFilterConfig::default(),
            working_size: (WORKING_WIDTH, WORKING_HEIGHT),
            previous_frame: None,
        }
    }

    pub fn with_filter(mut self, filter: FlowFilterConfig) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_working_size(mut self, width: u32, height: u32) -> Self {
        self.working_size = (width, height);
        self
    }

    /// A backend failure drops the stored frame, so the next call starts over.
    pub fn estimate_velocity(&mut self, image: &RgbImage) -> Result<Option<f64>, AppError> {
        let (width, height) = self.working_size;
        let current = working_grayscale(image, width, height, Downsampling::Area);

        let outcome = match self.previous_frame.take() {
            Some(previous) => self.filtered_flow_mean(&previous, &current),
            None => Ok(None),
        };
        if outcome.is_ok() {
            self.previous_frame = Some(current);
        }
        outcome
    }

    fn filtered_flow_mean(
        &mut self,
        previous: &GrayImage,
        current: &GrayImage,
    ) -> Result<Option<f64>, AppError> {
        let mut flow = self.flow.horizontal_flow(previous, current)?;
        suppress_bright_pixels(&mut flow, current, self.filter.brightness_threshold)?;

        let values = keep_dominant_direction(flow.into_raw_vec(), self.filter.balance_tolerance);
        Ok(top_magnitude_mean(&values, self.filter.magnitude_percentile))
    }

    pub fn reset(&mut self) {
        self.previous_frame = None;
    }

    pub fn has_previous_frame(&self) -> bool {
        self.previous_frame.is_some()
    }
}

pub fn suppress_bright_pixels(
    flow: &mut Array2<f32>,
    image: &GrayImage,
    threshold: u8,
) -> Result<(), AppError> {
    let intensity = intensity_view(image)?;
    if intensity.dim() != flow.dim() {
        return Err(AppError::Estimation(format!(
            "flow field is {:?} but image is {:?}",
            flow.dim(),
            intensity.dim()
        )));
    }

    Zip::from(flow).and(&intensity).for_each(|value, &pixel| {
        if pixel > threshold {
            *value = 0.0;
        }
    });
    Ok(())
}

/// Drops the minority sign when the split between positive and
/// non-positive values is further than `tolerance` from even.
pub fn keep_dominant_direction(values: Vec<f32>, tolerance: f64) -> Vec<f32> {
    if values.is_empty() {
        return values;
    }

    let positive = values.iter().filter(|value| **value > 0.0).count();
    let proportion = positive as f64 / values.len() as f64;
    if (proportion - 0.5).abs() <= tolerance {
        return values;
    }

    if proportion > 0.5 {
        values.into_iter().filter(|value| *value > 0.0).collect()
    } else {
        values.into_iter().filter(|value| *value < 0.0).collect()
    }
}

/// Mean of the signed values whose magnitude reaches the given percentile.
pub fn top_magnitude_mean(values: &[f32], percentile: f64) -> Option<f64> {
    let mut magnitudes: Vec<f64> = values.iter().map(|value| value.abs() as f64).collect();
    magnitudes.sort_by(|a, b| a.total_cmp(b));
    let threshold = interpolated_percentile(&magnitudes, percentile)?;

    let selected: Vec<f64> = values
        .iter()
        .map(|value| *value as f64)
        .filter(|value| value.abs() >= threshold)
        .collect();
    if selected.is_empty() {
        return None;
    }
    Some(selected.iter().sum::<f64>() / selected.len() as f64)
}

/// Linear interpolation between closest ranks over already sorted data.
pub fn interpolated_percentile(sorted: &[f64], percentile: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (percentile.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::{Luma, Rgb};

    /// Returns the same field for every pair.
    struct FixedFlow(Array2<f32>);

    impl DenseFlow for FixedFlow {
        fn horizontal_flow(
            &mut self,
            _previous: &GrayImage,
            _current: &GrayImage,
        ) -> Result<Array2<f32>, AppError> {
            Ok(self.0.clone())
        }
    }

    fn estimator(field: Array2<f32>) -> OpticalFlowEstimator {
        let (rows, cols) = field.dim();
        OpticalFlowEstimator::new(Box::new(FixedFlow(field)))
            .with_working_size(cols as u32, rows as u32)
    }

    fn dark_frame(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([40, 40, 40]))
    }

    #[test]
    fn first_frame_has_no_estimate() {
        let mut estimator = estimator(Array2::from_elem((24, 32), 3.0));
        assert_eq!(estimator.estimate_velocity(&dark_frame(32, 24)).unwrap(), None);
        assert!(estimator.has_previous_frame());
    }

    #[test]
    fn uniform_flow_is_returned() {
        let mut estimator = estimator(Array2::from_elem((24, 32), 3.0));
        estimator.estimate_velocity(&dark_frame(32, 24)).unwrap();
        let velocity = estimator.estimate_velocity(&dark_frame(32, 24)).unwrap();
        assert_relative_eq!(velocity.unwrap(), 3.0, epsilon = 1e-6);
    }

    #[test]
    fn zero_flow_field_has_no_estimate() {
        let mut estimator = estimator(Array2::zeros((24, 32)));
        estimator.estimate_velocity(&dark_frame(32, 24)).unwrap();
        assert_eq!(estimator.estimate_velocity(&dark_frame(32, 24)).unwrap(), None);
    }

    #[test]
    fn reset_forgets_previous_frame() {
        let mut estimator = estimator(Array2::from_elem((24, 32), -1.5));
        estimator.estimate_velocity(&dark_frame(32, 24)).unwrap();
        assert!(estimator.estimate_velocity(&dark_frame(32, 24)).unwrap().is_some());

        estimator.reset();
        assert!(!estimator.has_previous_frame());
        assert_eq!(estimator.estimate_velocity(&dark_frame(32, 24)).unwrap(), None);
    }

    struct FailingFlow;

    impl DenseFlow for FailingFlow {
        fn horizontal_flow(
            &mut self,
            _previous: &GrayImage,
            _current: &GrayImage,
        ) -> Result<Array2<f32>, AppError> {
            Err(AppError::Estimation("flow backend unavailable".into()))
        }
    }

    #[test]
    fn backend_failure_drops_previous_frame() {
        let mut estimator =
            OpticalFlowEstimator::new(Box::new(FailingFlow)).with_working_size(32, 24);
        assert_eq!(estimator.estimate_velocity(&dark_frame(32, 24)).unwrap(), None);
        assert!(estimator.estimate_velocity(&dark_frame(32, 24)).is_err());
        assert!(!estimator.has_previous_frame());
    }

    #[test]
    fn glare_flow_is_ignored() {
        let mut field = Array2::from_elem((10, 10), 1.0_f32);
        let mut frame = GrayImage::from_pixel(10, 10, Luma([50]));
        for row in 0..10 {
            field[[row, 0]] = 80.0;
            frame.put_pixel(0, row as u32, Luma([250]));
        }

        suppress_bright_pixels(&mut field, &frame, 225).unwrap();
        assert!(field.column(0).iter().all(|value| *value == 0.0));

        let values = keep_dominant_direction(field.into_raw_vec(), 0.05);
        assert_eq!(values.len(), 90);
        assert_relative_eq!(top_magnitude_mean(&values, 80.0).unwrap(), 1.0);
    }

    #[test]
    fn mismatched_flow_shape_is_an_error() {
        let mut field = Array2::zeros((4, 4));
        let frame = GrayImage::new(5, 4);
        assert!(suppress_bright_pixels(&mut field, &frame, 225).is_err());
    }

    #[test]
    fn skewed_flow_keeps_majority_sign() {
        let mut values = vec![-2.0_f32; 70];
        values.extend(std::iter::repeat(5.0).take(30));
        let kept = keep_dominant_direction(values, 0.05);
        assert_eq!(kept.len(), 70);
        assert!(kept.iter().all(|value| *value == -2.0));
    }

    #[test]
    fn balanced_flow_is_untouched() {
        let mut values = vec![-1.0_f32; 48];
        values.extend(std::iter::repeat(3.0).take(52));
        assert_eq!(keep_dominant_direction(values.clone(), 0.05), values);

        // 52 of 100 magnitudes are 3, so the 80th percentile is 3.
        assert_relative_eq!(top_magnitude_mean(&values, 80.0).unwrap(), 3.0);
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let sorted: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_relative_eq!(interpolated_percentile(&sorted, 80.0).unwrap(), 8.2, epsilon = 1e-12);
        assert_relative_eq!(interpolated_percentile(&sorted, 0.0).unwrap(), 1.0);
        assert_relative_eq!(interpolated_percentile(&sorted, 100.0).unwrap(), 10.0);
        assert_eq!(interpolated_percentile(&[], 50.0), None);

        let values: Vec<f32> = (1..=10).map(|value| value as f32).collect();
        assert_relative_eq!(top_magnitude_mean(&values, 80.0).unwrap(), 9.5);
    }
}
