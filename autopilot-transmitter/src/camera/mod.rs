pub mod acquisition;
#[cfg(feature = "camera")]
pub mod opencv_capture;

use std::sync::{Arc, Mutex, MutexGuard};

use crate::{shared_core_values::SharedFrameCounter, util::error::AppError};

/// Decoded camera frame, 8-bit RGB.
pub type Frame = image::RgbImage;

/// A buffered video source. Grabbing advances the stream without decoding,
/// retrieving decodes whatever was grabbed last.
pub trait FrameSource: Send {
    /// `false` when no frame could be pulled.
    fn grab(&mut self) -> Result<bool, AppError>;
    /// `None` when there is nothing to decode.
    fn retrieve(&mut self) -> Result<Option<Frame>, AppError>;
}

/// Frame source shared between the grabber thread and the control loop,
/// together with the count of frames the grabber pulled.
pub struct SharedCamera<S: FrameSource> {
    source: Arc<Mutex<S>>,
    frame_counter: Arc<SharedFrameCounter>,
}

impl<S: FrameSource> Clone for SharedCamera<S> {
    fn clone(&self) -> Self {
        SharedCamera {
            source: Arc::clone(&self.source),
            frame_counter: Arc::clone(&self.frame_counter),
        }
    }
}

impl<S: FrameSource> SharedCamera<S> {
    pub fn new(source: S) -> Self {
        SharedCamera {
            source: Arc::new(Mutex::new(source)),
            frame_counter: Arc::new(SharedFrameCounter::new()),
        }
    }

    fn lock_source(&self) -> Result<MutexGuard<'_, S>, AppError> {
        self.source
            .lock()
            .map_err(|_| AppError::LockPoisoned("camera"))
    }

    /// One background grab. The counter only moves when a frame was pulled.
    pub fn grab_and_count(&self) -> Result<bool, AppError> {
        let mut source = self.lock_source()?;
        let grabbed = source.grab()?;
        if grabbed {
            self.frame_counter.increment();
        }
        Ok(grabbed)
    }

    /// Decodes the newest frame. When the grabber pulled fewer than
    /// `frames_to_skip` frames since `last_frame_count`, the difference is
    /// grabbed here first so consecutive estimates are far enough apart.
    pub fn retrieve_latest(
        &self,
        last_frame_count: &mut u64,
        frames_to_skip: u64,
    ) -> Result<Option<Frame>, AppError> {
        let mut source = self.lock_source()?;
        let current_count = self.frame_counter.load();
        let skipped = current_count.saturating_sub(*last_frame_count);
        for _ in skipped..frames_to_skip {
            source.grab()?;
        }
        *last_frame_count = current_count;
        source.retrieve()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_counter.load()
    }

    pub fn with_source<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R, AppError> {
        let mut source = self.lock_source()?;
        Ok(f(&mut source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Every grab succeeds; retrieve reports how many grabs happened.
    #[derive(Default)]
    struct CountingSource {
        grabs: u8,
        fail_grabs: bool,
    }

    impl FrameSource for CountingSource {
        fn grab(&mut self) -> Result<bool, AppError> {
            if self.fail_grabs {
                return Ok(false);
            }
            self.grabs += 1;
            Ok(true)
        }

        fn retrieve(&mut self) -> Result<Option<Frame>, AppError> {
            Ok(Some(Frame::from_pixel(1, 1, Rgb([self.grabs, 0, 0]))))
        }
    }

    fn grabs_seen(frame: Option<Frame>) -> u8 {
        frame.unwrap().get_pixel(0, 0).0[0]
    }

    #[test]
    fn counter_follows_successful_grabs() {
        let camera = SharedCamera::new(CountingSource::default());
        assert!(camera.grab_and_count().unwrap());
        assert!(camera.grab_and_count().unwrap());
        assert_eq!(camera.frame_count(), 2);

        camera.with_source(|source| source.fail_grabs = true).unwrap();
        assert!(!camera.grab_and_count().unwrap());
        assert_eq!(camera.frame_count(), 2);
    }

    #[test]
    fn retrieval_tops_up_skipped_frames() {
        let camera = SharedCamera::new(CountingSource::default());
        let mut last_frame_count = 0;

        // Nothing grabbed in the background, both skips happen here.
        let frame = camera.retrieve_latest(&mut last_frame_count, 2).unwrap();
        assert_eq!(grabs_seen(frame), 2);
        assert_eq!(last_frame_count, 0);

        // One background grab, one more needed.
        camera.grab_and_count().unwrap();
        let frame = camera.retrieve_latest(&mut last_frame_count, 2).unwrap();
        assert_eq!(grabs_seen(frame), 4);
        assert_eq!(last_frame_count, 1);

        // Enough background grabs, nothing extra.
        for _ in 0..3 {
            camera.grab_and_count().unwrap();
        }
        let frame = camera.retrieve_latest(&mut last_frame_count, 2).unwrap();
        assert_eq!(grabs_seen(frame), 7);
        assert_eq!(last_frame_count, 4);
    }
}
