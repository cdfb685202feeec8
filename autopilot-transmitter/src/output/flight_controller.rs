use std::sync::{Mutex, MutexGuard};

use shared_definitions::{
    controller::{AxisUpdate, CommandFlags, ControlAxes, ControlState},
    packet::{ControlPacket, PACKET_SIZE},
};

use super::transport::{PacketTransport, UdpTransport};
use crate::{shared_core_values::AtomicControlAxes, util::error::AppError};

/// Owns the command state sent to the vehicle and the operator's trims.
pub struct FlightController<T: PacketTransport = UdpTransport> {
    state: Mutex<ControlState>,
    trims: AtomicControlAxes,
    transport: T,
}

impl<T: PacketTransport> FlightController<T> {
    pub fn new(transport: T) -> Self {
        FlightController {
            state: Mutex::new(ControlState::default()),
            trims: AtomicControlAxes::new(ControlAxes::centered()),
            transport,
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ControlState>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::LockPoisoned("control state"))
    }

    /// Writes the given axes and replaces every flag.
    pub fn set_command_state(&self, update: AxisUpdate, flags: CommandFlags) -> Result<(), AppError> {
        self.lock_state()?.apply(update, flags);
        Ok(())
    }

    pub fn get_command_state(&self) -> Result<ControlState, AppError> {
        Ok(*self.lock_state()?)
    }

    pub fn get_trims(&self) -> ControlAxes {
        self.trims.read()
    }

    pub fn set_trims(&self, trims: ControlAxes) {
        self.trims.store(trims);
    }

    pub fn adjust_trims(&self, delta: &ControlAxes) {
        self.trims.add(delta);
    }

    /// Clamps the live state in place and encodes it.
    pub fn construct_packet(&self) -> Result<[u8; PACKET_SIZE], AppError> {
        let mut state = self.lock_state()?;
        state.clamp_axes();
        Ok(ControlPacket::from_state(&state).to_bytes())
    }

    pub fn send_control_packet(&self) -> Result<usize, AppError> {
        let packet = self.construct_packet()?;
        self.transport.send_packet(&packet)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
