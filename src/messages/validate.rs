//! Structural validation for inbound envelopes.
//!
//! Envelope-level checks run first and short-circuit: the per-type payload
//! contract only ever sees an envelope whose frame is already well formed.
//! Every violation is an explicit, reported error naming the offending
//! field; nothing is silently dropped.

use chrono::DateTime;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::BridgeError;
use crate::messages::envelope::{Envelope, MessageType};
use crate::tasks::{TaskPriority, TaskState};
use crate::PROTOCOL_VERSION;

/// Validate the envelope frame, then its type-specific payload contract.
pub fn validate_envelope(envelope: &Envelope) -> Result<(), BridgeError> {
    if envelope.version != PROTOCOL_VERSION {
        return Err(invalid_envelope(format!(
            "unsupported version: {}",
            envelope.version
        )));
    }
    if envelope.message_id.is_empty() {
        return Err(invalid_envelope("missing message_id"));
    }
    if Uuid::parse_str(&envelope.message_id).is_err() {
        return Err(invalid_envelope(format!(
            "invalid message_id format: {}",
            envelope.message_id
        )));
    }
    if envelope.timestamp.is_empty() {
        return Err(invalid_envelope("missing timestamp"));
    }
    if DateTime::parse_from_rfc3339(&envelope.timestamp).is_err() {
        return Err(invalid_envelope(format!(
            "invalid timestamp format: {}",
            envelope.timestamp
        )));
    }
    if envelope.from_agent.is_empty() {
        return Err(invalid_envelope("missing from field"));
    }
    if envelope.to_agent.is_empty() {
        return Err(invalid_envelope("missing to field"));
    }

    validate_payload(envelope.message_type, &envelope.payload)
}

/// Check the required-field contract for the declared type.
///
/// The payload must be a JSON object for every type; a non-object payload
/// fails immediately regardless of type.
pub fn validate_payload(message_type: MessageType, payload: &Value) -> Result<(), BridgeError> {
    let Some(fields) = payload.as_object() else {
        return Err(invalid_payload("payload must be an object"));
    };

    match message_type {
        MessageType::TaskAssignment => {
            for field in ["task_id", "task_type", "title", "description", "payload"] {
                require(fields, field)?;
            }
            if let Some(priority) = fields.get("priority") {
                let name = priority.as_str().unwrap_or_default();
                if TaskPriority::parse(name).is_none() {
                    return Err(invalid_payload(format!("invalid priority: {priority}")));
                }
            }
        }
        MessageType::StatusUpdate => {
            require(fields, "task_id")?;
            require(fields, "status")?;
            let status = fields["status"].as_str().unwrap_or_default();
            if TaskState::parse(status).is_none() {
                return Err(invalid_payload(format!(
                    "invalid status: {}",
                    fields["status"]
                )));
            }
        }
        MessageType::TaskCompletion => {
            for field in ["task_id", "status", "result"] {
                require(fields, field)?;
            }
            let status = fields["status"].as_str().unwrap_or_default();
            if !matches!(
                TaskState::parse(status),
                Some(TaskState::Completed | TaskState::Failed)
            ) {
                return Err(invalid_payload(format!(
                    "invalid completion status: {}",
                    fields["status"]
                )));
            }
        }
        MessageType::Ping => {
            require(fields, "nonce")?;
        }
        // Error envelopes carry free-form diagnostic payloads.
        MessageType::Error => {}
    }

    Ok(())
}

fn require(fields: &Map<String, Value>, name: &str) -> Result<(), BridgeError> {
    if fields.contains_key(name) {
        Ok(())
    } else {
        Err(invalid_payload(format!("missing required field: {name}")))
    }
}

fn invalid_envelope(reason: impl Into<String>) -> BridgeError {
    BridgeError::InvalidEnvelope {
        reason: reason.into(),
    }
}

fn invalid_payload(reason: impl Into<String>) -> BridgeError {
    BridgeError::InvalidPayload {
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
