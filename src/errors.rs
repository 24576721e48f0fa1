//! Error kinds for the task store and the envelope pipeline.
//!
//! Failures are a tagged enumeration rather than an exception hierarchy:
//! callers branch on the variant, and transports map the coarse
//! [`ErrorCode`] onto their own status codes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the bridge core.
///
/// `TaskNotFound` and `InvalidTransition` come out of the task store;
/// `InvalidEnvelope` and `InvalidPayload` come out of the message pipeline,
/// where they are reported as a structured [`Ack`](crate::messages::Ack)
/// rather than raised across the dispatch boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The referenced task id does not exist in the store.
    #[error("task {task_id} not found")]
    TaskNotFound { task_id: String },

    /// The requested state change is outside the transition table, or the
    /// state name itself is not recognized.
    #[error("invalid state transition: {reason}")]
    InvalidTransition { reason: String },

    /// The envelope frame failed structural validation.
    #[error("invalid envelope: {reason}")]
    InvalidEnvelope { reason: String },

    /// The payload does not satisfy the contract for its declared type.
    #[error("invalid payload: {reason}")]
    InvalidPayload { reason: String },
}

impl BridgeError {
    /// Map this error onto the coarse code reported at the transport boundary.
    ///
    /// Structural rejections of an inbound envelope are format errors;
    /// anything else that leaks into the message path is internal.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidEnvelope { .. } | Self::InvalidPayload { .. } => {
                ErrorCode::InvalidMessageFormat
            }
            Self::TaskNotFound { .. } | Self::InvalidTransition { .. } => ErrorCode::InternalError,
        }
    }
}

/// Coarse error codes carried on a rejection acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The inbound value was rejected before any handler ran.
    InvalidMessageFormat,
    /// Processing failed for a reason unrelated to the wire format.
    InternalError,
}

impl ErrorCode {
    /// Wire name of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidMessageFormat => "INVALID_MESSAGE_FORMAT",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
