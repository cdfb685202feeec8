use image::RgbImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};

use super::{Frame, FrameSource};
use crate::util::error::AppError;

/// Network or device stream opened through OpenCV's video I/O.
pub struct OpenCvCapture {
    capture: VideoCapture,
    frame: Mat,
}

impl OpenCvCapture {
    pub fn open(url: &str) -> Result<Self, AppError> {
        let capture = VideoCapture::from_file(url, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(AppError::Camera(format!("could not open video stream {url}")));
        }
        log::info!("Opened video stream {url}");
        Ok(OpenCvCapture {
            capture,
            frame: Mat::default(),
        })
    }
}

impl FrameSource for OpenCvCapture {
    fn grab(&mut self) -> Result<bool, AppError> {
        Ok(self.capture.grab()?)
    }

    fn retrieve(&mut self) -> Result<Option<Frame>, AppError> {
        if !self.capture.retrieve(&mut self.frame, 0)? || self.frame.rows() == 0 {
            return Ok(None);
        }
        bgr_to_rgb_image(&self.frame).map(Some)
    }
}

impl Drop for OpenCvCapture {
    fn drop(&mut self) {
        if let Err(error) = self.capture.release() {
            log::warn!("Failed to release video capture: {error}");
        }
    }
}

fn bgr_to_rgb_image(frame: &Mat) -> Result<RgbImage, AppError> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

    let width = rgb.cols() as u32;
    let height = rgb.rows() as u32;
    let data = rgb.data_bytes()?.to_vec();
    RgbImage::from_vec(width, height, data)
        .ok_or_else(|| AppError::Camera(format!("frame buffer does not fit {width}x{height}")))
}
