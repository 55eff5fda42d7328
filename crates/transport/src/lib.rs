//! Best-effort broadcast transports.
//!
//! The chain consumes an abstract network with three operations — unicast,
//! broadcast and a non-blocking receive — and no delivery, ordering or
//! deduplication guarantees. Two implementations are provided:
//!
//! - [`MemoryHub`] / [`MemoryTransport`]: a shared mailbox map for
//!   multi-node tests and the simulation binary, with optional seeded
//!   packet loss.
//! - [`UdpTransport`]: UDP datagrams with `SO_BROADCAST` on a fixed port.
//!
//! Neither delivers a node's broadcasts back to itself. Self-delivery would
//! re-apply the node's own ACT transactions on top of the local staging
//! already done when they were cast, doubling every locally originated
//! vote; the UDP transport filters the loopback copies the kernel produces
//! for broadcast datagrams.

mod memory;
mod udp;

pub use memory::{MemoryHub, MemoryTransport};
pub use udp::UdpTransport;

use pollchain_types::PeerAddr;

/// A best-effort datagram network.
///
/// `send` and `broadcast` report refusal with `false`; callers are expected
/// to ignore it. `recv` never blocks: `None` means no packet is queued.
pub trait Transport {
    fn send(&mut self, bytes: &[u8], to: PeerAddr) -> bool;

    fn broadcast(&mut self, bytes: &[u8]) -> bool;

    fn recv(&mut self) -> Option<(Vec<u8>, PeerAddr)>;
}
