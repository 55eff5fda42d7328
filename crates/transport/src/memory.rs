//! In-memory transport for multi-node simulation.

use crate::Transport;
use parking_lot::Mutex;
use pollchain_types::PeerAddr;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

struct Packet {
    from: PeerAddr,
    bytes: Vec<u8>,
}

struct HubInner {
    mailboxes: HashMap<PeerAddr, VecDeque<Packet>>,
    next_index: u32,
    /// Probability that any delivery is dropped, 0.0..=1.0.
    loss_rate: f64,
    rng: ChaCha8Rng,
}

impl HubInner {
    fn should_drop(&mut self) -> bool {
        self.loss_rate > 0.0 && self.rng.gen::<f64>() < self.loss_rate
    }

    fn deliver(&mut self, to: PeerAddr, packet: Packet) {
        if self.should_drop() {
            return;
        }
        if let Some(mailbox) = self.mailboxes.get_mut(&to) {
            mailbox.push_back(packet);
        }
    }
}

/// Shared medium connecting [`MemoryTransport`] endpoints.
///
/// Endpoints get sequential addresses. Packet loss is probabilistic but
/// seeded, so a lossy run is reproducible.
#[derive(Clone)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
}

impl MemoryHub {
    /// A lossless hub.
    pub fn new() -> Self {
        Self::with_packet_loss(0.0, 0)
    }

    /// A hub dropping each delivery with probability `loss_rate`.
    pub fn with_packet_loss(loss_rate: f64, seed: u64) -> Self {
        MemoryHub {
            inner: Arc::new(Mutex::new(HubInner {
                mailboxes: HashMap::new(),
                next_index: 0,
                loss_rate: loss_rate.clamp(0.0, 1.0),
                rng: ChaCha8Rng::seed_from_u64(seed),
            })),
        }
    }

    /// Register a new endpoint on the hub.
    pub fn endpoint(&self) -> MemoryTransport {
        let mut inner = self.inner.lock();
        let addr = index_addr(inner.next_index);
        inner.next_index += 1;
        inner.mailboxes.insert(addr, VecDeque::new());

        MemoryTransport {
            hub: self.inner.clone(),
            addr,
        }
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One node's attachment to a [`MemoryHub`].
pub struct MemoryTransport {
    hub: Arc<Mutex<HubInner>>,
    addr: PeerAddr,
}

impl MemoryTransport {
    /// This endpoint's address on the hub.
    pub fn local_addr(&self) -> PeerAddr {
        self.addr
    }
}

/// Pack an endpoint index into an opaque peer address.
fn index_addr(index: u32) -> PeerAddr {
    let mut bytes = [0u8; PeerAddr::LEN];
    bytes[0..4].copy_from_slice(&index.to_le_bytes());
    PeerAddr::from_bytes(bytes)
}

impl Transport for MemoryTransport {
    fn send(&mut self, bytes: &[u8], to: PeerAddr) -> bool {
        let mut inner = self.hub.lock();
        inner.deliver(
            to,
            Packet {
                from: self.addr,
                bytes: bytes.to_vec(),
            },
        );
        true
    }

    fn broadcast(&mut self, bytes: &[u8]) -> bool {
        let mut inner = self.hub.lock();
        // Every registered endpoint except the sender hears a broadcast.
        let targets: Vec<PeerAddr> = inner
            .mailboxes
            .keys()
            .copied()
            .filter(|addr| *addr != self.addr)
            .collect();
        for to in targets {
            inner.deliver(
                to,
                Packet {
                    from: self.addr,
                    bytes: bytes.to_vec(),
                },
            );
        }
        true
    }

    fn recv(&mut self) -> Option<(Vec<u8>, PeerAddr)> {
        let mut inner = self.hub.lock();
        let packet = inner.mailboxes.get_mut(&self.addr)?.pop_front()?;
        Some((packet.bytes, packet.from))
    }
}
