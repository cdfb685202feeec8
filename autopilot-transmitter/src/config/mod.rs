pub mod constants;

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use shared_definitions::controller::PidTuneConfig;

use crate::{estimation::EstimationMethod, util::error::AppError};

use self::constants::{
    CAMERA_URL, FEATURE_MATCHING_PID, FRAMES_TO_SKIP, GRAB_INTERVAL_MS, INPUT_DEVICE,
    OPTICAL_FLOW_PID, SEND_PERIOD_MS, VEHICLE_ADDRESS,
};

#[derive(Debug, Clone)]
pub struct AutopilotConfig {
    pub vehicle_address: SocketAddr,
    pub camera_url: String,
    pub input_device: PathBuf,
    pub method: EstimationMethod,
    pub pid: PidTuneConfig,
    pub send_period: Duration,
    pub frames_to_skip: u64,
    pub grab_interval: Duration,
}

impl AutopilotConfig {
    /// Defaults with the gains tuned for `method`.
    pub fn for_method(method: EstimationMethod) -> Self {
        AutopilotConfig {
            vehicle_address: VEHICLE_ADDRESS,
            camera_url: CAMERA_URL.to_string(),
            input_device: PathBuf::from(INPUT_DEVICE),
            method,
            pid: default_pid_tune(method),
            send_period: Duration::from_millis(SEND_PERIOD_MS),
            frames_to_skip: FRAMES_TO_SKIP,
            grab_interval: Duration::from_millis(GRAB_INTERVAL_MS),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.send_period.is_zero() {
            return Err(AppError::InvalidConfig(
                "send period must be greater than zero".to_string(),
            ));
        }

        let gains = [
            ("kp", self.pid.proportional_multiplier),
            ("ki", self.pid.integral_multiplier),
            ("kd", self.pid.derivative_multiplier),
        ];
        if let Some((name, value)) = gains.iter().find(|(_, value)| !value.is_finite()) {
            return Err(AppError::InvalidConfig(format!("{name} must be finite, got {value}")));
        }

        // An infinite bound is allowed and disables the clamp.
        if self.pid.max_accumulated_error.is_nan() || self.pid.max_accumulated_error < 0.0 {
            return Err(AppError::InvalidConfig(format!(
                "max integral must be non-negative, got {}",
                self.pid.max_accumulated_error
            )));
        }

        if self.camera_url.trim().is_empty() {
            return Err(AppError::InvalidConfig("camera url is empty".to_string()));
        }
        Ok(())
    }
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self::for_method(EstimationMethod::FeatureMatching)
    }
}

pub fn default_pid_tune(method: EstimationMethod) -> PidTuneConfig {
    match method {
        EstimationMethod::FeatureMatching => FEATURE_MATCHING_PID,
        EstimationMethod::OpticalFlow => OPTICAL_FLOW_PID,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AutopilotConfig::default().validate().unwrap();
        AutopilotConfig::for_method(EstimationMethod::OpticalFlow)
            .validate()
            .unwrap();
    }

    #[test]
    fn gains_follow_the_method() {
        let config = AutopilotConfig::for_method(EstimationMethod::OpticalFlow);
        assert_eq!(config.pid, OPTICAL_FLOW_PID);
        assert_eq!(config.send_period, Duration::from_millis(50));
        assert_eq!(config.vehicle_address.port(), 7099);
    }

    #[test]
    fn rejects_zero_period_and_bad_gains() {
        let mut config = AutopilotConfig::default();
        config.send_period = Duration::ZERO;
        assert!(matches!(config.validate(), Err(AppError::InvalidConfig(_))));

        let mut config = AutopilotConfig::default();
        config.pid.integral_multiplier = f64::NAN;
        assert!(matches!(config.validate(), Err(AppError::InvalidConfig(_))));

        let mut config = AutopilotConfig::default();
        config.pid.max_accumulated_error = -1.0;
        assert!(matches!(config.validate(), Err(AppError::InvalidConfig(_))));
    }
}
