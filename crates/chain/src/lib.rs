//! The replicated voting-chain state machine.
//!
//! This crate is the core of pollchain: the block DAG, the pending-orphan
//! pool, vote staging, the proof-of-work queue, protocol dispatch and the
//! longest-chain vote tally.
//!
//! # Architecture
//!
//! The chain is built on a simple event-driven model:
//!
//! ```text
//! ChainEvents → ChainState::handle() → ChainActions
//! ```
//!
//! The state machine is:
//! - **Synchronous**: no async, no `.await`
//! - **Single-owner**: the DAG, pools and sequence map are never shared
//! - **I/O-free**: all network traffic is described by returned actions
//!
//! The runner (production or in-memory simulation) delivers events, executes
//! the returned actions against a transport, and drives the clocked parts of
//! an iteration — [`ChainState::reconcile`] and [`ChainState::try_seal`] —
//! on its own schedule.

mod dag;
mod event;
mod pending;
mod staging;
mod state;

pub use dag::{AttachOutcome, AttachedBlock, BlockDag, BlockIndex};
pub use event::{ChainAction, ChainEvent};
pub use pending::PendingPool;
pub use staging::{PowQueue, QueuedBlock, Staging};
pub use state::{ChainState, ChainStatus, SEQ_RESTART_GAP};
