use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use crate::util::error::AppError;

/// Sink for encoded control packets.
pub trait PacketTransport: Send + Sync {
    fn send_packet(&self, packet: &[u8]) -> Result<usize, AppError>;
}

/// Non-blocking UDP socket aimed at the vehicle.
pub struct UdpTransport {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl UdpTransport {
    pub fn connect(destination: SocketAddr) -> Result<Self, AppError> {
        let local: SocketAddr = match destination {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)?;
        socket.set_nonblocking(true)?;
        Ok(UdpTransport {
            socket,
            destination,
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.socket.local_addr()?)
    }
}

impl PacketTransport for UdpTransport {
    fn send_packet(&self, packet: &[u8]) -> Result<usize, AppError> {
        Ok(self.socket.send_to(packet, self.destination)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn delivers_datagram_over_loopback() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let transport = UdpTransport::connect(receiver.local_addr().unwrap()).unwrap();
        assert_eq!(transport.destination(), receiver.local_addr().unwrap());
        assert_eq!(transport.send_packet(&[1, 2, 3]).unwrap(), 3);

        let mut buffer = [0_u8; 16];
        let (length, from) = receiver.recv_from(&mut buffer).unwrap();
        assert_eq!(&buffer[..length], &[1, 2, 3]);
        assert_eq!(from.port(), transport.local_addr().unwrap().port());
    }
}
