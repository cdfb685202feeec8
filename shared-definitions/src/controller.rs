use bitfield_struct::bitfield;

/// Neutral value for every control axis.
pub const AXIS_CENTER: i32 = 128;
pub const AXIS_MIN: i32 = 1;
pub const AXIS_MAX: i32 = 255;
/// Accelerator requests at or below this collapse to zero.
pub const ACCELERATOR_DEAD_ZONE: i32 = 1;

/// Mode flags as they appear in byte 6 of the control packet.
/// Ordered LSB to MSB, bits 5 and 6 are reserved.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct CommandFlags {
    pub fast_ascend: bool,
    pub fast_descend: bool,
    pub emergency_stop: bool,
    // Hardware behavior of the next two is unverified, they are passed through as-is.
    pub circle_turn_end: bool,
    pub no_head_mode: bool,
    #[bits(2)]
    __: u8,
    pub gyro_correction: bool,
}

impl CommandFlags {
    pub const WIRE_MASK: u8 = 0b1001_1111;

    pub fn wire_byte(&self) -> u8 {
        u8::from(*self) & Self::WIRE_MASK
    }

    pub fn is_empty(&self) -> bool {
        self.wire_byte() == 0
    }
}

/// One value per control axis. Also used for trims and input deltas, so the
/// values are plain integers without any range restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlAxes {
    pub turn: i32,
    pub accelerator: i32,
    pub roll: i32,
    pub pitch: i32,
}

impl ControlAxes {
    pub const fn splat(value: i32) -> Self {
        ControlAxes {
            turn: value,
            accelerator: value,
            roll: value,
            pitch: value,
        }
    }

    pub const fn centered() -> Self {
        Self::splat(AXIS_CENTER)
    }

    pub const fn zero() -> Self {
        Self::splat(0)
    }

    pub fn offset_by(&self, delta: &ControlAxes) -> ControlAxes {
        ControlAxes {
            turn: self.turn + delta.turn,
            accelerator: self.accelerator + delta.accelerator,
            roll: self.roll + delta.roll,
            pitch: self.pitch + delta.pitch,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

impl Default for ControlAxes {
    fn default() -> Self {
        Self::centered()
    }
}

/// Partial axis write, `None` leaves the current value untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisUpdate {
    pub turn: Option<i32>,
    pub accelerator: Option<i32>,
    pub roll: Option<i32>,
    pub pitch: Option<i32>,
}

impl AxisUpdate {
    pub fn all(axes: ControlAxes) -> Self {
        AxisUpdate {
            turn: Some(axes.turn),
            accelerator: Some(axes.accelerator),
            roll: Some(axes.roll),
            pitch: Some(axes.pitch),
        }
    }

    pub fn roll_only(roll: i32) -> Self {
        AxisUpdate {
            roll: Some(roll),
            ..Default::default()
        }
    }

    pub fn without_roll(mut self) -> Self {
        self.roll = None;
        self
    }
}

/// Live command state held by the flight controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub axes: ControlAxes,
    pub flags: CommandFlags,
}

impl ControlState {
    pub fn apply(&mut self, update: AxisUpdate, flags: CommandFlags) {
        if let Some(turn) = update.turn {
            self.axes.turn = turn;
        }
        if let Some(accelerator) = update.accelerator {
            self.axes.accelerator = accelerator;
        }
        if let Some(roll) = update.roll {
            self.axes.roll = roll;
        }
        if let Some(pitch) = update.pitch {
            self.axes.pitch = pitch;
        }
        self.flags = flags;
    }

    /// Rewrites the axes into their transmissible range. Packet construction
    /// calls this on the live state, so the clamped values persist.
    pub fn clamp_axes(&mut self) {
        self.axes.turn = clamp_axis(self.axes.turn);
        self.axes.accelerator = clamp_accelerator(self.axes.accelerator);
        self.axes.roll = clamp_axis(self.axes.roll);
        self.axes.pitch = clamp_axis(self.axes.pitch);
    }
}

impl Default for ControlState {
    fn default() -> Self {
        ControlState {
            axes: ControlAxes::centered(),
            flags: CommandFlags::new(),
        }
    }
}

pub fn clamp_axis(value: i32) -> i32 {
    value.clamp(AXIS_MIN, AXIS_MAX)
}

pub fn clamp_accelerator(value: i32) -> i32 {
    if value <= ACCELERATOR_DEAD_ZONE {
        0
    } else {
        value.min(AXIS_MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidTuneConfig {
    pub proportional_multiplier: f64,
    pub integral_multiplier: f64,
    pub derivative_multiplier: f64,
    pub max_accumulated_error: f64,
}
