use std::{
    thread::sleep,
    time::{Duration, Instant},
};

use shared_definitions::controller::AxisUpdate;

use super::pid::PID;
use crate::{
    camera::{FrameSource, SharedCamera},
    config::{
        constants::{FRAMES_TO_SKIP, SEND_PERIOD_MS},
        AutopilotConfig,
    },
    estimation::VelocityEstimator,
    input::{InputSnapshot, RemoteControl},
    output::{flight_controller::FlightController, transport::PacketTransport},
    util::error::AppError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightMode {
    Manual,
    Autopilot,
}

impl FlightMode {
    fn toggled(self) -> Self {
        match self {
            FlightMode::Manual => FlightMode::Autopilot,
            FlightMode::Autopilot => FlightMode::Manual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub send_period: Duration,
    pub frames_to_skip: u64,
}

impl Default for LoopSettings {
    fn default() -> Self {
        LoopSettings {
            send_period: Duration::from_millis(SEND_PERIOD_MS),
            frames_to_skip: FRAMES_TO_SKIP,
        }
    }
}

impl From<&AutopilotConfig> for LoopSettings {
    fn from(config: &AutopilotConfig) -> Self {
        LoopSettings {
            send_period: config.send_period,
            frames_to_skip: config.frames_to_skip,
        }
    }
}

/// What happened on one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pub mode: FlightMode,
    pub velocity: Option<f64>,
    pub roll_command: Option<i32>,
    pub exit_requested: bool,
}

/// Arbitrates between operator input and the vision autopilot and keeps
/// the control packet flowing at a fixed rate.
pub struct ControlLoop<R: RemoteControl, S: FrameSource, T: PacketTransport> {
    flight_controller: FlightController<T>,
    input: R,
    camera: SharedCamera<S>,
    estimator: VelocityEstimator,
    pid: PID,
    settings: LoopSettings,
    mode: FlightMode,
    toggle_held: bool,
    last_frame_count: u64,
}

impl<R: RemoteControl, S: FrameSource, T: PacketTransport> ControlLoop<R, S, T> {
    pub fn new(
        flight_controller: FlightController<T>,
        input: R,
        camera: SharedCamera<S>,
        estimator: VelocityEstimator,
        pid: PID,
        settings: LoopSettings,
    ) -> Self {
        ControlLoop {
            flight_controller,
            input,
            camera,
            estimator,
            pid,
            settings,
            mode: FlightMode::Manual,
            toggle_held: false,
            last_frame_count: 0,
        }
    }

    pub fn mode(&self) -> FlightMode {
        self.mode
    }

    pub fn flight_controller(&self) -> &FlightController<T> {
        &self.flight_controller
    }

    pub fn estimator(&self) -> &VelocityEstimator {
        &self.estimator
    }

    pub fn pid(&self) -> &PID {
        &self.pid
    }

    /// Ticks until the operator asks to exit. The packet of the exit tick
    /// is still sent.
    pub fn run(&mut self) -> Result<(), AppError> {
        log::info!(
            "Control loop running every {:?} with {} estimation",
            self.settings.send_period,
            self.estimator.method()
        );
        loop {
            let outcome = self.tick()?;
            if outcome.exit_requested {
                log::info!("Exit requested, stopping control loop");
                return Ok(());
            }
        }
    }

    /// One full period: update the command state, wait out the rest of the
    /// period, send once.
    pub fn tick(&mut self) -> Result<TickOutcome, AppError> {
        let started = Instant::now();
        let outcome = self.process_tick()?;

        if let Some(remaining) = self.settings.send_period.checked_sub(started.elapsed()) {
            sleep(remaining);
        }
        match self.flight_controller.send_control_packet() {
            Ok(_) => {}
            Err(error @ AppError::LockPoisoned(_)) => return Err(error),
            Err(error) => log::warn!("Failed to send control packet: {error}"),
        }
        Ok(outcome)
    }

    /// The tick without pacing or sending.
    pub fn process_tick(&mut self) -> Result<TickOutcome, AppError> {
        let input = self.input.current_input();

        if input.any_input {
            if self.mode == FlightMode::Autopilot {
                log::info!("Manual input, autopilot disengaged");
            }
            self.mode = FlightMode::Manual;
            self.reset_autopilot_state();
        }

        if input.autopilot_toggle && !self.toggle_held {
            self.mode = self.mode.toggled();
            self.reset_autopilot_state();
            log::info!("Toggled flight mode to {:?}", self.mode);
        }
        self.toggle_held = input.autopilot_toggle;

        self.apply_operator_input(&input)?;

        let mut outcome = TickOutcome {
            mode: self.mode,
            velocity: None,
            roll_command: None,
            exit_requested: input.exit_requested,
        };
        if self.mode == FlightMode::Autopilot {
            self.autopilot_update(&input, &mut outcome)?;
        }
        Ok(outcome)
    }

    fn reset_autopilot_state(&mut self) {
        self.pid.reset();
        self.estimator.reset();
    }

    fn apply_operator_input(&self, input: &InputSnapshot) -> Result<(), AppError> {
        if let Some(adjustment) = input.trim_adjustment {
            self.flight_controller.adjust_trims(&adjustment);
            log::debug!("Trims now {:?}", self.flight_controller.get_trims());
            return Ok(());
        }

        let axes = self.flight_controller.get_trims().offset_by(&input.deltas);
        let update = match self.mode {
            FlightMode::Manual => AxisUpdate::all(axes),
            FlightMode::Autopilot => AxisUpdate::all(axes).without_roll(),
        };
        self.flight_controller.set_command_state(update, input.flags)
    }

    fn autopilot_update(
        &mut self,
        input: &InputSnapshot,
        outcome: &mut TickOutcome,
    ) -> Result<(), AppError> {
        let frame = match self
            .camera
            .retrieve_latest(&mut self.last_frame_count, self.settings.frames_to_skip)
        {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::warn!("Failed to read frame, skipping autopilot update");
                return Ok(());
            }
            Err(error @ AppError::LockPoisoned(_)) => return Err(error),
            Err(error) => {
                log::warn!("Failed to read frame, skipping autopilot update: {error}");
                return Ok(());
            }
        };

        let Some(velocity) = self.estimator.estimate_velocity(&frame) else {
            log::debug!("No velocity estimate, roll unchanged");
            return Ok(());
        };

        let correction = self.pid.update(velocity);
        let roll = self
            .flight_controller
            .get_trims()
            .roll
            .saturating_sub(correction.round() as i32);
        self.flight_controller
            .set_command_state(AxisUpdate::roll_only(roll), input.flags)?;
        log::debug!("Velocity {velocity:.4}, roll {roll}");

        outcome.velocity = Some(velocity);
        outcome.roll_command = Some(roll);
        Ok(())
    }
}
