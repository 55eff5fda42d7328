//! Wire codec for pollchain transactions.
//!
//! # Wire Format
//!
//! Every transaction is one fixed 73-byte frame, little-endian throughout:
//!
//! ```text
//! [magic: u32][channel: u16][kind: u16][sequence: u32][payload: 61 bytes]
//! ```
//!
//! The payload arm is selected by `kind`: a block image for `SYNC` and
//! `NOTIFY_SIGNED`, a single vote byte (zero-padded) for `ACT`, all zeroes
//! for `DISCOVER`. Field order and widths are consensus-relevant; changing
//! them is a hard fork.
//!
//! The codec decodes `magic` and `channel` but does not filter on them —
//! that is protocol dispatch, owned by the chain. Decoding only fails for
//! frames that cannot have been produced by `encode`.

use pollchain_types::{Action, Block, Channel};
use thiserror::Error;

/// Frame marker, ASCII `PFNS` packed big-endian into a `u32`.
pub const MAGIC: u32 = u32::from_be_bytes(*b"PFNS");

/// Header width: magic + channel + kind + sequence.
pub const HEADER_LEN: usize = 12;

/// Total frame width: header plus the block-sized payload arm.
pub const FRAME_LEN: usize = HEADER_LEN + Block::ENCODED_LEN;

/// Errors produced by [`decode`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("frame truncated: {0} bytes, expected {FRAME_LEN}")]
    Truncated(usize),

    #[error("trailing bytes after frame: {0} bytes, expected {FRAME_LEN}")]
    TrailingBytes(usize),

    #[error("unknown transaction kind: {0}")]
    UnknownKind(u16),

    #[error("block payload records more votes than it can hold")]
    MalformedBlock,
}

/// Transaction discriminant on the wire.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// Ask every peer to sync us their chain.
    Discover = 0,
    /// One attached block, sent in response to a DISCOVER.
    Sync = 1,
    /// A freshly sealed block.
    NotifySigned = 2,
    /// A single vote to stage.
    Act = 3,
}

impl TransactionKind {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(TransactionKind::Discover),
            1 => Some(TransactionKind::Sync),
            2 => Some(TransactionKind::NotifySigned),
            3 => Some(TransactionKind::Act),
            _ => None,
        }
    }

    /// Wire name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            TransactionKind::Discover => "DISCOVER",
            TransactionKind::Sync => "SYNC",
            TransactionKind::NotifySigned => "NOTIFY_SIGNED",
            TransactionKind::Act => "ACT",
        }
    }
}

/// Payload union, tagged by [`TransactionKind`].
///
/// `SYNC` and `NOTIFY_SIGNED` share the block arm, so the kind lives in the
/// transaction header rather than being derived from the arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Discover,
    Block(Block),
    Act(Action),
}

impl Payload {
    fn matches(&self, kind: TransactionKind) -> bool {
        matches!(
            (self, kind),
            (Payload::Discover, TransactionKind::Discover)
                | (Payload::Block(_), TransactionKind::Sync)
                | (Payload::Block(_), TransactionKind::NotifySigned)
                | (Payload::Act(_), TransactionKind::Act)
        )
    }
}

/// A decoded transaction frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    pub magic: u32,
    pub channel: Channel,
    pub kind: TransactionKind,
    pub sequence: u32,
    pub payload: Payload,
}

impl Transaction {
    /// A frame carrying `payload`, stamped with the protocol magic.
    ///
    /// `kind` must select the payload's arm.
    pub fn new(channel: Channel, kind: TransactionKind, sequence: u32, payload: Payload) -> Self {
        debug_assert!(payload.matches(kind), "payload arm does not match kind");
        Transaction {
            magic: MAGIC,
            channel,
            kind,
            sequence,
            payload,
        }
    }
}

/// Encode a transaction into its fixed frame.
pub fn encode(tx: &Transaction) -> [u8; FRAME_LEN] {
    let mut out = [0u8; FRAME_LEN];
    out[0..4].copy_from_slice(&tx.magic.to_le_bytes());
    out[4..6].copy_from_slice(&tx.channel.0.to_le_bytes());
    out[6..8].copy_from_slice(&(tx.kind as u16).to_le_bytes());
    out[8..12].copy_from_slice(&tx.sequence.to_le_bytes());

    match &tx.payload {
        Payload::Discover => {}
        Payload::Block(block) => {
            out[HEADER_LEN..].copy_from_slice(&block.to_bytes());
        }
        Payload::Act(action) => {
            out[HEADER_LEN] = action.0;
        }
    }

    out
}

/// Decode one frame.
pub fn decode(bytes: &[u8]) -> Result<Transaction, CodecError> {
    if bytes.len() < FRAME_LEN {
        return Err(CodecError::Truncated(bytes.len()));
    }
    if bytes.len() > FRAME_LEN {
        return Err(CodecError::TrailingBytes(bytes.len()));
    }

    let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let channel = Channel(u16::from_le_bytes([bytes[4], bytes[5]]));
    let kind_raw = u16::from_le_bytes([bytes[6], bytes[7]]);
    let sequence = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

    let kind = TransactionKind::from_u16(kind_raw).ok_or(CodecError::UnknownKind(kind_raw))?;

    let payload = match kind {
        TransactionKind::Discover => Payload::Discover,
        TransactionKind::Sync | TransactionKind::NotifySigned => {
            let mut image = [0u8; Block::ENCODED_LEN];
            image.copy_from_slice(&bytes[HEADER_LEN..]);
            let block = Block::from_bytes(&image).ok_or(CodecError::MalformedBlock)?;
            Payload::Block(block)
        }
        TransactionKind::Act => Payload::Act(Action(bytes[HEADER_LEN])),
    };

    Ok(Transaction {
        magic,
        channel,
        kind,
        sequence,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollchain_types::Hash;

    fn sample_block() -> Block {
        let mut block = Block::unsigned(Hash::compute(b"parent"));
        block.pow_signature = 7;
        block.push_vote(Action(b'A'));
        block.push_vote(Action(b'B'));
        block
    }

    #[test]
    fn discover_round_trips() {
        let tx = Transaction::new(Channel(3), TransactionKind::Discover, 41, Payload::Discover);
        let decoded = decode(&encode(&tx)).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.kind, TransactionKind::Discover);
    }

    #[test]
    fn sync_and_notify_round_trip_distinctly() {
        for kind in [TransactionKind::Sync, TransactionKind::NotifySigned] {
            let tx = Transaction::new(Channel(0), kind, 9, Payload::Block(sample_block()));
            let decoded = decode(&encode(&tx)).unwrap();
            assert_eq!(decoded.kind, kind);
            assert_eq!(decoded, tx);
        }
    }

    #[test]
    fn act_round_trips() {
        let tx = Transaction::new(Channel(1), TransactionKind::Act, 0, Payload::Act(Action(b'Z')));
        assert_eq!(decode(&encode(&tx)).unwrap(), tx);
    }

    #[test]
    fn bad_magic_still_decodes() {
        // The codec hands bad magic to dispatch instead of rejecting it.
        let mut bytes = encode(&Transaction::new(
            Channel(0),
            TransactionKind::Discover,
            1,
            Payload::Discover,
        ));
        bytes[0] ^= 0xFF;
        let decoded = decode(&bytes).unwrap();
        assert_ne!(decoded.magic, MAGIC);
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let bytes = encode(&Transaction::new(
            Channel(0),
            TransactionKind::Discover,
            1,
            Payload::Discover,
        ));
        assert_eq!(
            decode(&bytes[..FRAME_LEN - 1]),
            Err(CodecError::Truncated(FRAME_LEN - 1))
        );
        assert_eq!(decode(&[]), Err(CodecError::Truncated(0)));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode(&Transaction::new(
            Channel(0),
            TransactionKind::Discover,
            1,
            Payload::Discover,
        ))
        .to_vec();
        bytes.push(0);
        assert_eq!(
            decode(&bytes),
            Err(CodecError::TrailingBytes(FRAME_LEN + 1))
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut bytes = encode(&Transaction::new(
            Channel(0),
            TransactionKind::Discover,
            1,
            Payload::Discover,
        ));
        bytes[6] = 9;
        assert_eq!(decode(&bytes), Err(CodecError::UnknownKind(9)));
    }

    #[test]
    fn oversized_vote_count_is_rejected() {
        let mut bytes = encode(&Transaction::new(
            Channel(0),
            TransactionKind::Sync,
            1,
            Payload::Block(sample_block()),
        ));
        bytes[FRAME_LEN - 1] = 200;
        assert_eq!(decode(&bytes), Err(CodecError::MalformedBlock));
    }
}
