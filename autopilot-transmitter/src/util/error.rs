use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown estimation method `{0}`, expected `feature_matching` or `optical_flow`")]
    UnknownEstimationMethod(String),
    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),
    #[error("camera error: {0}")]
    Camera(String),
    #[error("velocity estimation failed: {0}")]
    Estimation(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(feature = "camera")]
impl From<opencv::Error> for AppError {
    fn from(error: opencv::Error) -> Self {
        AppError::Camera(error.to_string())
    }
}
