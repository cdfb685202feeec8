use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::{sleep, JoinHandle},
    time::Duration,
};

use super::{FrameSource, SharedCamera};
use crate::util::error::AppError;

const FAILURE_LOG_INTERVAL: u64 = 100;

/// Keeps the capture buffer drained on a background thread so that a
/// retrieve always decodes a recent frame. Stops and joins on drop.
pub struct FrameGrabber {
    stop_requested: Arc<AtomicBool>,
    failed_grabs: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl FrameGrabber {
    pub fn start<S: FrameSource + 'static>(
        camera: SharedCamera<S>,
        grab_interval: Duration,
    ) -> Result<Self, AppError> {
        let stop_requested = Arc::new(AtomicBool::new(false));
        let failed_grabs = Arc::new(AtomicU64::new(0));

        let thread_stop = Arc::clone(&stop_requested);
        let thread_failures = Arc::clone(&failed_grabs);
        let handle = std::thread::Builder::new()
            .name("frame-grabber".to_string())
            .spawn(move || grab_loop(camera, grab_interval, thread_stop, thread_failures))?;

        Ok(FrameGrabber {
            stop_requested,
            failed_grabs,
            handle: Some(handle),
        })
    }

    pub fn failed_grabs(&self) -> u64 {
        self.failed_grabs.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_requested.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Frame grabber thread panicked");
            }
        }
    }
}

impl Drop for FrameGrabber {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn grab_loop<S: FrameSource>(
    camera: SharedCamera<S>,
    grab_interval: Duration,
    stop_requested: Arc<AtomicBool>,
    failed_grabs: Arc<AtomicU64>,
) {
    log::debug!("Frame grabber started");
    while !stop_requested.load(Ordering::Acquire) {
        let failure = match camera.grab_and_count() {
            Ok(true) => None,
            Ok(false) => Some("no frame available".to_string()),
            Err(AppError::LockPoisoned(name)) => {
                log::error!("Frame grabber stopping, {name} lock poisoned");
                return;
            }
            Err(error) => Some(error.to_string()),
        };

        match failure {
            Some(reason) => {
                let failures = failed_grabs.fetch_add(1, Ordering::Relaxed) + 1;
                if failures % FAILURE_LOG_INTERVAL == 1 {
                    log::warn!("Frame grab failed ({failures} so far): {reason}");
                }
            }
            None => log::trace!("Grabbed frame {}", camera.frame_count()),
        }
        sleep(grab_interval);
    }
    log::debug!("Frame grabber stopped");
}
