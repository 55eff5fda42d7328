//! UDP transport with limited-broadcast fan-out.

use crate::Transport;
use pollchain_types::PeerAddr;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use tracing::debug;

/// Largest datagram we accept. Protocol frames are 73 bytes; anything
/// larger did not come from this protocol and will be rejected by the
/// codec.
const MAX_DATAGRAM: usize = 512;

/// Datagram transport on a fixed port shared by every node on the segment.
///
/// Broadcast uses the limited broadcast address, so "every peer" means
/// every host on the local network listening on the same port. Sends are
/// fire-and-forget; a refused send is reported as `false` and the caller
/// moves on.
pub struct UdpTransport {
    socket: UdpSocket,
    port: u16,
    /// Primary outbound address of this host, used to recognise loopback
    /// copies of our own broadcasts.
    local_ip: Option<Ipv4Addr>,
}

impl UdpTransport {
    /// Bind the shared protocol port on all interfaces.
    pub fn bind(port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))?;
        socket.set_nonblocking(true)?;
        socket.set_broadcast(true)?;
        Ok(UdpTransport {
            socket,
            port,
            local_ip: local_ip_hint(),
        })
    }

    /// The port this transport sends to and listens on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// A broadcast datagram we sent comes back from our own address on the
    /// protocol port; one host runs one node, so that pair identifies us.
    fn is_self(&self, sender: SocketAddrV4) -> bool {
        sender.port() == self.port
            && (sender.ip().is_loopback() || Some(*sender.ip()) == self.local_ip)
    }
}

/// The address the kernel would route external traffic from. Connecting a
/// datagram socket sends no packets; it only fixes the local endpoint.
fn local_ip_hint() -> Option<Ipv4Addr> {
    let probe = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    probe
        .connect(SocketAddrV4::new(Ipv4Addr::new(203, 0, 113, 1), 9))
        .ok()?;
    match probe.local_addr().ok()? {
        SocketAddr::V4(addr) => Some(*addr.ip()),
        SocketAddr::V6(_) => None,
    }
}

/// Pack an IPv4 socket address into an opaque peer address:
/// `[octets(4) ‖ port(2 LE) ‖ zeroes]`.
pub(crate) fn socket_to_peer(addr: SocketAddrV4) -> PeerAddr {
    let mut bytes = [0u8; PeerAddr::LEN];
    bytes[0..4].copy_from_slice(&addr.ip().octets());
    bytes[4..6].copy_from_slice(&addr.port().to_le_bytes());
    PeerAddr::from_bytes(bytes)
}

pub(crate) fn peer_to_socket(addr: PeerAddr) -> SocketAddrV4 {
    let bytes = addr.as_bytes();
    SocketAddrV4::new(
        Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]),
        u16::from_le_bytes([bytes[4], bytes[5]]),
    )
}

impl Transport for UdpTransport {
    fn send(&mut self, bytes: &[u8], to: PeerAddr) -> bool {
        let target = peer_to_socket(to);
        match self.socket.send_to(bytes, target) {
            Ok(_) => true,
            Err(error) => {
                debug!(%target, %error, "unicast send refused");
                false
            }
        }
    }

    fn broadcast(&mut self, bytes: &[u8]) -> bool {
        let target = SocketAddrV4::new(Ipv4Addr::BROADCAST, self.port);
        match self.socket.send_to(bytes, target) {
            Ok(_) => true,
            Err(error) => {
                debug!(%error, "broadcast send refused");
                false
            }
        }
    }

    fn recv(&mut self) -> Option<(Vec<u8>, PeerAddr)> {
        let mut buffer = [0u8; MAX_DATAGRAM];
        loop {
            match self.socket.recv_from(&mut buffer) {
                Ok((len, SocketAddr::V4(sender))) => {
                    if self.is_self(sender) {
                        continue;
                    }
                    return Some((buffer[..len].to_vec(), socket_to_peer(sender)));
                }
                // The socket is v4-bound; a v6 sender should not occur, but
                // skip rather than stall the drain loop.
                Ok((_, SocketAddr::V6(_))) => continue,
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return None,
                Err(error) => {
                    debug!(%error, "receive failed");
                    return None;
                }
            }
        }
    }
}
