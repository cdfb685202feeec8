use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use shared_definitions::controller::PidTuneConfig;

// Vehicle link
pub const VEHICLE_ADDRESS: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 1), 7099));
pub const CAMERA_URL: &str = "rtsp://192.168.1.1:7070/webcam";
pub const INPUT_DEVICE: &str = "/dev/input/event0";

// Loop timing
pub const SEND_PERIOD_MS: u64 = 50; // 20Hz
pub const GRAB_INTERVAL_MS: u64 = 1;
pub const FRAMES_TO_SKIP: u64 = 2;

// Manual input
pub const CONTROL_AUTHORITY: i32 = 128;
pub const FINE_CONTROL_AUTHORITY: i32 = 64;
pub const TRIM_AUTHORITY: i32 = 1;

// Both estimators work on a downsampled copy of the camera frame
pub const WORKING_WIDTH: u32 = 320;
pub const WORKING_HEIGHT: u32 = 240;
// Not calibrated, the PID gains absorb the error
pub const FOCAL_LENGTH_PX: f64 = 450.0;

// Feature matching
pub const ORB_MAX_FEATURES: i32 = 3000;
pub const MATCH_RATIO: f32 = 0.75;
pub const MAX_MATCH_DISTANCE: u32 = 32;

// Optical flow
pub const BRIGHTNESS_THRESHOLD: u8 = 225;
pub const DIRECTION_BALANCE_TOLERANCE: f64 = 0.05;
pub const FLOW_MAGNITUDE_PERCENTILE: f64 = 80.0;

// Estimates are in normalized image units here, hence the large gains
pub const FEATURE_MATCHING_PID: PidTuneConfig = PidTuneConfig {
    proportional_multiplier: 300.0,
    integral_multiplier: 300.0,
    derivative_multiplier: 10.0,
    max_accumulated_error: 0.2,
};

// Estimates are in pixels per sample here
pub const OPTICAL_FLOW_PID: PidTuneConfig = PidTuneConfig {
    proportional_multiplier: 0.5,
    integral_multiplier: 1.0,
    derivative_multiplier: 0.05,
    max_accumulated_error: 50.0,
};
