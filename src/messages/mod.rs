//! Envelope protocol: wire codec, payload contracts, and dispatch.

pub mod dispatch;
pub mod envelope;
pub mod validate;

pub use dispatch::{Ack, Dispatcher, Handler};
pub use envelope::{Envelope, MessageType};
pub use validate::{validate_envelope, validate_payload};
