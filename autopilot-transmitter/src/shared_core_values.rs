use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use shared_definitions::controller::ControlAxes;

/// Per-axis atomics. Loads and stores are individually atomic, a whole
/// `ControlAxes` is not.
pub struct AtomicControlAxes {
    pub turn: AtomicI32,
    pub accelerator: AtomicI32,
    pub roll: AtomicI32,
    pub pitch: AtomicI32,
}

impl AtomicControlAxes {
    pub const fn new(axes: ControlAxes) -> Self {
        AtomicControlAxes {
            turn: AtomicI32::new(axes.turn),
            accelerator: AtomicI32::new(axes.accelerator),
            roll: AtomicI32::new(axes.roll),
            pitch: AtomicI32::new(axes.pitch),
        }
    }

    pub fn store(&self, axes: ControlAxes) {
        self.turn.store(axes.turn, Ordering::Relaxed);
        self.accelerator.store(axes.accelerator, Ordering::Relaxed);
        self.roll.store(axes.roll, Ordering::Relaxed);
        self.pitch.store(axes.pitch, Ordering::Relaxed);
    }

    pub fn add(&self, delta: &ControlAxes) {
        self.turn.fetch_add(delta.turn, Ordering::Relaxed);
        self.accelerator.fetch_add(delta.accelerator, Ordering::Relaxed);
        self.roll.fetch_add(delta.roll, Ordering::Relaxed);
        self.pitch.fetch_add(delta.pitch, Ordering::Relaxed);
    }

    pub fn read(&self) -> ControlAxes {
        ControlAxes {
            turn: self.turn.load(Ordering::Relaxed),
            accelerator: self.accelerator.load(Ordering::Relaxed),
            roll: self.roll.load(Ordering::Relaxed),
            pitch: self.pitch.load(Ordering::Relaxed),
        }
    }
}

/// Number of frames the background grabber has pulled off the capture.
#[derive(Default)]
pub struct SharedFrameCounter(AtomicU64);

impl SharedFrameCounter {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn load(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}
