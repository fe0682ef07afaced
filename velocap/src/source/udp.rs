//! Live packets from a sensor on the network.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use log::{debug, trace};
use socket2::{Domain, Protocol, Socket, Type};

use super::{PacketSource, RawPacket, SourceError};

/// Port Velodyne sensors send data packets to
pub const DEFAULT_DATA_PORT: u16 = 2368;

/// Upper bound on how long a read may block before the stop flag is checked
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

const RECV_BUFFER_SIZE: usize = 2048;

/// Parse a listen address. A bare port listens on all interfaces.
pub fn parse_listen_address(s: &str) -> Option<SocketAddr> {
    if let Ok(port) = s.parse::<u16>() {
        return Some(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)));
    }
    s.parse::<SocketAddr>().ok()
}

// this will be common for all our sockets
fn new_socket(addr: &SocketAddr) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(*addr), Type::DGRAM, Some(Protocol::UDP))?;

    // we're going to use read timeouts so that we don't hang waiting for packets
    socket.set_read_timeout(Some(READ_TIMEOUT))?;
    socket.set_reuse_address(true)?;

    Ok(socket)
}

/// Receives data packets on a UDP port
pub struct UdpSource {
    addr: SocketAddr,
    identifier: String,
    socket: Option<UdpSocket>,
    buf: Box<[u8; RECV_BUFFER_SIZE]>,
}

impl UdpSource {
    pub fn new(addr: SocketAddr) -> Self {
        UdpSource {
            addr,
            identifier: addr.to_string(),
            socket: None,
            buf: Box::new([0u8; RECV_BUFFER_SIZE]),
        }
    }

    /// Address actually bound, useful when listening on port 0
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

impl PacketSource for UdpSource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn open(&mut self) -> Result<(), SourceError> {
        let socket = new_socket(&self.addr)?;
        socket.bind(&self.addr.into())?;
        let socket: UdpSocket = socket.into();

        debug!("Listening for data packets on {}", self.addr);
        self.socket = Some(socket);
        Ok(())
    }

    fn next_packet(&mut self) -> Result<Option<RawPacket>, SourceError> {
        let socket = match self.socket.as_ref() {
            Some(socket) => socket,
            None => return Err(SourceError::NotOpen(self.identifier.clone())),
        };

        match socket.recv_from(&mut self.buf[..]) {
            Ok((len, from)) => {
                let timestamp_us = chrono::Utc::now().timestamp_micros().max(0) as u64;
                trace!("{} bytes from {}", len, from);
                Ok(Some(RawPacket::new(self.buf[..len].to_vec(), timestamp_us)))
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                Err(SourceError::Timeout)
            }
            Err(e) => Err(SourceError::Io(e)),
        }
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!("Closed socket on {}", self.addr);
        }
    }
}
