pub mod flight_controller;
pub mod transport;
