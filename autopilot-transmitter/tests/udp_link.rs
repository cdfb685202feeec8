use std::{net::UdpSocket, time::Duration};

use autopilot_transmitter::output::{flight_controller::FlightController, transport::UdpTransport};
use shared_definitions::{
    controller::{AxisUpdate, CommandFlags, ControlAxes},
    packet::{ControlPacket, PACKET_SIZE},
};

#[test]
fn control_packet_arrives_intact() {
    let vehicle = UdpSocket::bind("127.0.0.1:0").unwrap();
    vehicle
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();

    let controller = FlightController::new(UdpTransport::connect(vehicle.local_addr().unwrap()).unwrap());
    controller
        .set_command_state(
            AxisUpdate::all(ControlAxes {
                turn: 100,
                accelerator: 180,
                roll: 140,
                pitch: 300,
            }),
            CommandFlags::new().with_fast_ascend(true),
        )
        .unwrap();
    assert_eq!(controller.send_control_packet().unwrap(), PACKET_SIZE);

    let mut buffer = [0_u8; 64];
    let (length, _) = vehicle.recv_from(&mut buffer).unwrap();
    let packet = ControlPacket::parse(&buffer[..length]).unwrap();

    assert_eq!(packet.turn, 100);
    assert_eq!(packet.accelerator, 180);
    assert_eq!(packet.roll, 140);
    assert_eq!(packet.pitch, 255);
    assert!(packet.flags.fast_ascend());
    assert!(!packet.flags.emergency_stop());
}
