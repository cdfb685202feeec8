use std::{net::SocketAddr, path::PathBuf, process::ExitCode, time::Duration};

use autopilot_transmitter::{
    camera::{acquisition::FrameGrabber, opencv_capture::OpenCvCapture, SharedCamera},
    config::{
        constants::{CAMERA_URL, FRAMES_TO_SKIP, INPUT_DEVICE, SEND_PERIOD_MS, VEHICLE_ADDRESS},
        AutopilotConfig,
    },
    control::{
        control_loops::{ControlLoop, LoopSettings},
        pid::PID,
    },
    estimation::{EstimationMethod, VelocityEstimator},
    input::KeyboardInputMapper,
    output::{flight_controller::FlightController, transport::UdpTransport},
    util::error::AppError,
};
use clap::Parser;
use proctitle::set_title;

/// Keyboard and vision autopilot transmitter for UDP controlled drones.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Vehicle control endpoint
    #[arg(long = "vehicle-addr", default_value_t = VEHICLE_ADDRESS)]
    vehicle_address: SocketAddr,

    /// Video stream opened for the autopilot
    #[arg(long, default_value = CAMERA_URL)]
    camera_url: String,

    /// evdev keyboard device
    #[arg(long, default_value = INPUT_DEVICE)]
    input_device: PathBuf,

    /// `feature_matching` or `optical_flow`
    #[arg(long, default_value = "feature_matching")]
    method: String,

    /// Proportional gain, defaults to the method's tuning
    #[arg(long)]
    kp: Option<f64>,

    /// Integral gain, defaults to the method's tuning
    #[arg(long)]
    ki: Option<f64>,

    /// Derivative gain, defaults to the method's tuning
    #[arg(long)]
    kd: Option<f64>,

    /// Bound on the accumulated error
    #[arg(long)]
    max_integral: Option<f64>,

    /// Milliseconds between control packets
    #[arg(long, default_value_t = SEND_PERIOD_MS)]
    period_ms: u64,

    /// Minimum frames between two autopilot estimates
    #[arg(long, default_value_t = FRAMES_TO_SKIP)]
    frames_to_skip: u64,
}

impl Args {
    fn into_config(self) -> Result<AutopilotConfig, AppError> {
        let method: EstimationMethod = self.method.parse()?;
        let mut config = AutopilotConfig::for_method(method);
        config.vehicle_address = self.vehicle_address;
        config.camera_url = self.camera_url;
        config.input_device = self.input_device;
        config.send_period = Duration::from_millis(self.period_ms);
        config.frames_to_skip = self.frames_to_skip;
        if let Some(kp) = self.kp {
            config.pid.proportional_multiplier = kp;
        }
        if let Some(ki) = self.ki {
            config.pid.integral_multiplier = ki;
        }
        if let Some(kd) = self.kd {
            config.pid.derivative_multiplier = kd;
        }
        if let Some(max_integral) = self.max_integral {
            config.pid.max_accumulated_error = max_integral;
        }
        config.validate()?;
        Ok(config)
    }
}

fn run(config: AutopilotConfig) -> Result<(), AppError> {
    log::info!(
        "Sending to {} using {} estimation",
        config.vehicle_address,
        config.method
    );

    let flight_controller = FlightController::new(UdpTransport::connect(config.vehicle_address)?);

    let keyboard = KeyboardInputMapper::new();
    let _input_thread = keyboard.start_event_handler_thread(&config.input_device)?;

    let camera = SharedCamera::new(OpenCvCapture::open(&config.camera_url)?);
    let _grabber = FrameGrabber::start(camera.clone(), config.grab_interval)?;

    let mut control_loop = ControlLoop::new(
        flight_controller,
        keyboard,
        camera,
        VelocityEstimator::from_method(config.method)?,
        PID::from_tune(&config.pid),
        LoopSettings::from(&config),
    );
    control_loop.run()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    set_title("autopilot-transmitter");

    let result = Args::parse().into_config().and_then(run);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{error}");
            ExitCode::FAILURE
        }
    }
}
