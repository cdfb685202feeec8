use std::io::{self, Read};

use byteorder::{NativeEndian, ReadBytesExt};

use super::ControlKeys;

/// Size of `struct input_event` on 64-bit Linux.
pub const INPUT_EVENT_SIZE: usize = 24;

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTypes {
    Synchronization = 0,
    Key = 1,
    Relative = 2,
    Absolute = 3,
}

impl TryFrom<u16> for EventTypes {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EventTypes::Synchronization),
            1 => Ok(EventTypes::Key),
            2 => Ok(EventTypes::Relative),
            3 => Ok(EventTypes::Absolute),
            other => Err(other),
        }
    }
}

/// Linux key codes for the keys the transmitter reacts to.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCodes {
    Esc = 1,
    Q = 16,
    W = 17,
    E = 18,
    P = 25,
    Enter = 28,
    LeftCtrl = 29,
    A = 30,
    S = 31,
    D = 32,
    G = 34,
    LeftShift = 42,
    C = 46,
    N = 49,
    RightShift = 54,
    Space = 57,
    RightCtrl = 97,
    Up = 103,
    Down = 108,
}

impl KeyCodes {
    pub fn control_key(&self) -> ControlKeys {
        match self {
            KeyCodes::W => ControlKeys::PITCH_FORWARD,
            KeyCodes::S => ControlKeys::PITCH_BACK,
            KeyCodes::A => ControlKeys::ROLL_LEFT,
            KeyCodes::D => ControlKeys::ROLL_RIGHT,
            KeyCodes::Q => ControlKeys::TURN_LEFT,
            KeyCodes::E => ControlKeys::TURN_RIGHT,
            KeyCodes::LeftShift | KeyCodes::RightShift => ControlKeys::THROTTLE_UP,
            KeyCodes::LeftCtrl | KeyCodes::RightCtrl => ControlKeys::THROTTLE_DOWN,
            KeyCodes::Space => ControlKeys::FINE_CONTROL,
            KeyCodes::Enter => ControlKeys::TRIM,
            KeyCodes::Up => ControlKeys::FAST_ASCEND,
            KeyCodes::Down => ControlKeys::FAST_DESCEND,
            KeyCodes::Esc => ControlKeys::EMERGENCY_STOP,
            KeyCodes::C => ControlKeys::CIRCLE_TURN_END,
            KeyCodes::N => ControlKeys::NO_HEAD_MODE,
            KeyCodes::G => ControlKeys::GYRO_CORRECTION,
            KeyCodes::P => ControlKeys::AUTOPILOT,
        }
    }
}

impl TryFrom<u16> for KeyCodes {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let key = match value {
            1 => KeyCodes::Esc,
            16 => KeyCodes::Q,
            17 => KeyCodes::W,
            18 => KeyCodes::E,
            25 => KeyCodes::P,
            28 => KeyCodes::Enter,
            29 => KeyCodes::LeftCtrl,
            30 => KeyCodes::A,
            31 => KeyCodes::S,
            32 => KeyCodes::D,
            34 => KeyCodes::G,
            42 => KeyCodes::LeftShift,
            46 => KeyCodes::C,
            49 => KeyCodes::N,
            54 => KeyCodes::RightShift,
            57 => KeyCodes::Space,
            97 => KeyCodes::RightCtrl,
            103 => KeyCodes::Up,
            108 => KeyCodes::Down,
            other => return Err(other),
        };
        Ok(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Released,
    Pressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub tv_sec: u64,
    pub tv_usec: u64,
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

impl InputEvent {
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(InputEvent {
            tv_sec: reader.read_u64::<NativeEndian>()?,
            tv_usec: reader.read_u64::<NativeEndian>()?,
            event_type: reader.read_u16::<NativeEndian>()?,
            code: reader.read_u16::<NativeEndian>()?,
            value: reader.read_i32::<NativeEndian>()?,
        })
    }

    /// Key and state for key events. Auto-repeat counts as pressed.
    pub fn key_change(&self) -> Option<(KeyCodes, KeyState)> {
        if EventTypes::try_from(self.event_type) != Ok(EventTypes::Key) {
            return None;
        }
        let key = KeyCodes::try_from(self.code).ok()?;
        let state = match self.value {
            0 => KeyState::Released,
            1 | 2 => KeyState::Pressed,
            _ => return None,
        };
        Some((key, state))
    }
}
