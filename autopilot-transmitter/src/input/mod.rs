use std::{
    fs::File,
    io::{BufReader, ErrorKind},
    path::Path,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    thread::JoinHandle,
};

use bitflags::bitflags;
use shared_definitions::controller::{CommandFlags, ControlAxes};

use self::controller::{InputEvent, KeyState};
use crate::{
    config::constants::{CONTROL_AUTHORITY, FINE_CONTROL_AUTHORITY, TRIM_AUTHORITY},
    util::error::AppError,
};

pub mod controller;

bitflags! {
    /// Keys currently held down.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ControlKeys: u32 {
        const PITCH_FORWARD = 1 << 0;
        const PITCH_BACK = 1 << 1;
        const ROLL_LEFT = 1 << 2;
        const ROLL_RIGHT = 1 << 3;
        const TURN_LEFT = 1 << 4;
        const TURN_RIGHT = 1 << 5;
        const THROTTLE_UP = 1 << 6;
        const THROTTLE_DOWN = 1 << 7;
        const FINE_CONTROL = 1 << 8;
        const TRIM = 1 << 9;
        const FAST_ASCEND = 1 << 10;
        const FAST_DESCEND = 1 << 11;
        const EMERGENCY_STOP = 1 << 12;
        const CIRCLE_TURN_END = 1 << 13;
        const NO_HEAD_MODE = 1 << 14;
        const GYRO_CORRECTION = 1 << 15;
        const AUTOPILOT = 1 << 16;
    }
}

/// What the operator asked for on one tick of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSnapshot {
    /// Added to the trims to get the commanded axes.
    pub deltas: ControlAxes,
    pub flags: CommandFlags,
    /// Set while trim mode is held; the axes are not written that tick.
    pub trim_adjustment: Option<ControlAxes>,
    /// Level of the autopilot key, the loop detects the edge.
    pub autopilot_toggle: bool,
    pub exit_requested: bool,
    pub any_input: bool,
}

impl InputSnapshot {
    pub fn idle() -> Self {
        InputSnapshot {
            deltas: ControlAxes::zero(),
            flags: CommandFlags::new(),
            trim_adjustment: None,
            autopilot_toggle: false,
            exit_requested: false,
            any_input: false,
        }
    }
}

impl Default for InputSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

fn axis_value(keys: ControlKeys, positive: ControlKeys, negative: ControlKeys, amount: i32) -> i32 {
    if keys.contains(positive) {
        amount
    } else if keys.contains(negative) {
        -amount
    } else {
        0
    }
}

fn axes_from_keys(keys: ControlKeys, amount: i32) -> ControlAxes {
    ControlAxes {
        turn: axis_value(keys, ControlKeys::TURN_RIGHT, ControlKeys::TURN_LEFT, amount),
        accelerator: axis_value(keys, ControlKeys::THROTTLE_UP, ControlKeys::THROTTLE_DOWN, amount),
        roll: axis_value(keys, ControlKeys::ROLL_RIGHT, ControlKeys::ROLL_LEFT, amount),
        pitch: axis_value(keys, ControlKeys::PITCH_FORWARD, ControlKeys::PITCH_BACK, amount),
    }
}

impl ControlKeys {
    pub fn to_snapshot(self) -> InputSnapshot {
        let mut snapshot = InputSnapshot {
            autopilot_toggle: self.contains(ControlKeys::AUTOPILOT),
            exit_requested: self.contains(ControlKeys::EMERGENCY_STOP),
            any_input: !self.difference(ControlKeys::AUTOPILOT).is_empty(),
            ..InputSnapshot::idle()
        };

        if self.contains(ControlKeys::TRIM) {
            snapshot.trim_adjustment = Some(axes_from_keys(self, TRIM_AUTHORITY));
            return snapshot;
        }

        let authority = if self.contains(ControlKeys::FINE_CONTROL) {
            FINE_CONTROL_AUTHORITY
        } else {
            CONTROL_AUTHORITY
        };
        snapshot.deltas = axes_from_keys(self, authority);
        snapshot.flags = CommandFlags::new()
            .with_fast_ascend(self.contains(ControlKeys::FAST_ASCEND))
            .with_fast_descend(self.contains(ControlKeys::FAST_DESCEND))
            .with_emergency_stop(self.contains(ControlKeys::EMERGENCY_STOP))
            .with_circle_turn_end(self.contains(ControlKeys::CIRCLE_TURN_END))
            .with_no_head_mode(self.contains(ControlKeys::NO_HEAD_MODE))
            .with_gyro_correction(self.contains(ControlKeys::GYRO_CORRECTION));
        snapshot
    }
}

/// Source of operator input, polled once per control loop tick.
pub trait RemoteControl {
    fn current_input(&mut self) -> InputSnapshot;
}

/// Tracks pressed keys from a Linux evdev keyboard.
#[derive(Clone, Default)]
pub struct KeyboardInputMapper {
    pressed_keys: Arc<AtomicU32>,
}

impl KeyboardInputMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pressed_keys(&self) -> ControlKeys {
        ControlKeys::from_bits_truncate(self.pressed_keys.load(Ordering::Acquire))
    }

    pub fn handle_event(&self, event: &InputEvent) {
        let Some((key, state)) = event.key_change() else {
            return;
        };
        let bits = key.control_key().bits();
        match state {
            KeyState::Pressed => self.pressed_keys.fetch_or(bits, Ordering::AcqRel),
            KeyState::Released => self.pressed_keys.fetch_and(!bits, Ordering::AcqRel),
        };
    }

    /// Opens `device_path` and follows it on a background thread. The thread
    /// ends when the device goes away.
    pub fn start_event_handler_thread(&self, device_path: &Path) -> Result<JoinHandle<()>, AppError> {
        let device = File::open(device_path)?;
        let mapper = self.clone();
        let handle = std::thread::Builder::new()
            .name("keyboard-input".to_string())
            .spawn(move || mapper.event_thread_fn(device))?;
        log::info!("Reading keyboard events from {}", device_path.display());
        Ok(handle)
    }

    fn event_thread_fn(&self, device: File) {
        let mut reader = BufReader::new(device);
        loop {
            match InputEvent::read_from(&mut reader) {
                Ok(event) => self.handle_event(&event),
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => {
                    log::error!("Keyboard input stopped: {error}");
                    self.pressed_keys.store(0, Ordering::Release);
                    break;
                }
            }
        }
    }
}

impl RemoteControl for KeyboardInputMapper {
    fn current_input(&mut self) -> InputSnapshot {
        self.pressed_keys().to_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_event(code: u16, value: i32) -> InputEvent {
        InputEvent {
            tv_sec: 0,
            tv_usec: 0,
            event_type: 1,
            code,
            value,
        }
    }

    #[test]
    fn no_keys_is_idle() {
        assert_eq!(ControlKeys::empty().to_snapshot(), InputSnapshot::idle());
    }

    #[test]
    fn movement_keys_apply_full_authority() {
        let snapshot = (ControlKeys::PITCH_FORWARD | ControlKeys::ROLL_LEFT | ControlKeys::THROTTLE_UP)
            .to_snapshot();
        assert!(snapshot.any_input);
        assert_eq!(
            snapshot.deltas,
            ControlAxes {
                turn: 0,
                accelerator: 128,
                roll: -128,
                pitch: 128,
            }
        );
    }

    #[test]
    fn space_halves_authority() {
        let snapshot = (ControlKeys::TURN_RIGHT | ControlKeys::FINE_CONTROL).to_snapshot();
        assert_eq!(snapshot.deltas.turn, 64);
    }

    #[test]
    fn opposing_keys_favor_the_first_binding() {
        let snapshot = (ControlKeys::PITCH_FORWARD | ControlKeys::PITCH_BACK).to_snapshot();
        assert_eq!(snapshot.deltas.pitch, 128);
    }

    #[test]
    fn trim_mode_adjusts_trims_only() {
        let snapshot = (ControlKeys::TRIM
            | ControlKeys::ROLL_RIGHT
            | ControlKeys::THROTTLE_DOWN
            | ControlKeys::FAST_ASCEND)
            .to_snapshot();
        assert!(snapshot.any_input);
        assert!(snapshot.deltas.is_zero());
        assert!(snapshot.flags.is_empty());
        assert_eq!(
            snapshot.trim_adjustment,
            Some(ControlAxes {
                turn: 0,
                accelerator: -1,
                roll: 1,
                pitch: 0,
            })
        );
    }

    #[test]
    fn mode_keys_set_flags() {
        let snapshot = (ControlKeys::FAST_DESCEND | ControlKeys::NO_HEAD_MODE | ControlKeys::GYRO_CORRECTION)
            .to_snapshot();
        assert_eq!(snapshot.flags.wire_byte(), 0b1001_0010);
        assert!(!snapshot.exit_requested);

        let stop = ControlKeys::EMERGENCY_STOP.to_snapshot();
        assert!(stop.flags.emergency_stop());
        assert!(stop.exit_requested);
    }

    #[test]
    fn autopilot_key_alone_is_not_input() {
        let snapshot = ControlKeys::AUTOPILOT.to_snapshot();
        assert!(snapshot.autopilot_toggle);
        assert!(!snapshot.any_input);
    }

    #[test]
    fn mapper_tracks_press_and_release() {
        let mut mapper = KeyboardInputMapper::new();
        mapper.handle_event(&key_event(17, 1));
        mapper.handle_event(&key_event(42, 1));
        mapper.handle_event(&key_event(35, 1));
        assert_eq!(
            mapper.pressed_keys(),
            ControlKeys::PITCH_FORWARD | ControlKeys::THROTTLE_UP
        );

        mapper.handle_event(&key_event(17, 0));
        mapper.handle_event(&key_event(42, 2));
        assert_eq!(mapper.pressed_keys(), ControlKeys::THROTTLE_UP);
        assert_eq!(mapper.current_input().deltas.accelerator, 128);
    }

    #[test]
    fn missing_device_is_an_io_error() {
        let mapper = KeyboardInputMapper::new();
        let result = mapper.start_event_handler_thread(Path::new("/nonexistent/input/event99"));
        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
