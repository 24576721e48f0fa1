//! Handler registry and failure-isolating dispatch.
//!
//! Handlers are registered per envelope type and invoked in registration
//! order on the calling thread. A handler's error (or panic) is captured
//! and logged; it never aborts the remaining handlers and never changes
//! the envelope's own outcome.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::errors::{BridgeError, ErrorCode};
use crate::messages::envelope::{Envelope, MessageType};
use crate::messages::validate::validate_envelope;

/// A registered envelope handler.
///
/// Handlers report failure by returning an error; the dispatcher logs it
/// and keeps going.
pub type Handler = Box<dyn Fn(&Envelope) -> Result<(), anyhow::Error> + Send + Sync>;

/// Protocol-level acknowledgement produced for every inbound wire value.
///
/// Serializes to `{"status": "success", "message_id", "processed_at"}` or
/// `{"status": "error", "error", "error_code"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Ack {
    /// The envelope was structurally valid and dispatched.
    Success {
        /// Echo of the envelope's message id.
        message_id: String,
        /// RFC 3339 processing time.
        processed_at: String,
    },
    /// The envelope was rejected before any handler ran.
    Error {
        /// Human-readable rejection reason.
        error: String,
        /// Coarse code for transport-level mapping.
        error_code: ErrorCode,
    },
}

impl Ack {
    /// Whether this acknowledgement reports success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    fn rejected(err: BridgeError) -> Self {
        Self::Error {
            error: err.to_string(),
            error_code: err.code(),
        }
    }
}

/// Routes validated envelopes to registered handlers.
///
/// Zero, one, or many handlers may be registered per type; an envelope of a
/// type with no handlers still acknowledges success once validated.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<MessageType, Vec<Handler>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&str, usize> = self
            .handlers
            .iter()
            .map(|(message_type, handlers)| (message_type.as_str(), handlers.len()))
            .collect();
        f.debug_struct("Dispatcher").field("handlers", &counts).finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher with no registered handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an envelope type.
    ///
    /// Handlers for the same type run in registration order.
    pub fn register<F>(&mut self, message_type: MessageType, handler: F)
    where
        F: Fn(&Envelope) -> Result<(), anyhow::Error> + Send + Sync + 'static,
    {
        self.handlers
            .entry(message_type)
            .or_default()
            .push(Box::new(handler));
    }

    /// Number of handlers registered for a type.
    pub fn handler_count(&self, message_type: MessageType) -> usize {
        self.handlers
            .get(&message_type)
            .map_or(0, |handlers| handlers.len())
    }

    /// Decode, validate, and dispatch one inbound wire value.
    ///
    /// Validation failures short-circuit with an error acknowledgement; no
    /// handler sees a structurally invalid envelope. Handler-level failures
    /// do not affect the returned acknowledgement.
    pub fn process(&self, value: Value) -> Ack {
        let envelope = match Envelope::from_value(value) {
            Ok(envelope) => envelope,
            Err(err) => {
                log::warn!("rejected inbound message: {err}");
                return Ack::rejected(err);
            }
        };

        if let Err(err) = validate_envelope(&envelope) {
            log::warn!("rejected {} message {}: {err}", envelope.message_type, envelope.message_id);
            return Ack::rejected(err);
        }

        self.dispatch(&envelope);

        Ack::Success {
            message_id: envelope.message_id,
            processed_at: Utc::now().to_rfc3339(),
        }
    }

    /// Invoke every handler registered for the envelope's type, isolating
    /// each handler's failure.
    pub fn dispatch(&self, envelope: &Envelope) {
        let Some(handlers) = self.handlers.get(&envelope.message_type) else {
            log::debug!("no handlers registered for {}", envelope.message_type);
            return;
        };

        log::debug!(
            "dispatching {} message {} to {} handler(s)",
            envelope.message_type,
            envelope.message_id,
            handlers.len()
        );

        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(envelope))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    log::error!(
                        "handler error for {} message {}: {err}",
                        envelope.message_type,
                        envelope.message_id
                    );
                }
                Err(_) => {
                    log::error!(
                        "handler panic for {} message {}",
                        envelope.message_type,
                        envelope.message_id
                    );
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
