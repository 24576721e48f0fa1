//! # a2a-bridge
//!
//! Core coordination layer for asynchronous work handed between autonomous
//! agents: a task lifecycle state machine backed by a mutex-guarded store,
//! and a typed envelope protocol with per-type payload contracts and
//! failure-isolated dispatch.
//!
//! Transport delivery, agent capability cards, peer discovery, and
//! persistence live in external collaborators; this crate only produces and
//! consumes the wire shapes they exchange.

pub mod errors;
pub mod messages;
pub mod tasks;

pub use errors::{BridgeError, ErrorCode};
pub use messages::{Ack, Dispatcher, Envelope, MessageType};
pub use tasks::{Task, TaskPriority, TaskState, TaskStore};

/// The single supported envelope protocol version.
pub const PROTOCOL_VERSION: &str = "1.0.0";
