//! Wire envelope and typed outbound constructors.
//!
//! The wire shape is the exact field set
//! `{version, message_id, timestamp, from, to, type, payload, signature}`.
//! Transports deliver inbound bytes already decoded to this structure;
//! everything the core consumes or produces goes through [`Envelope`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::errors::BridgeError;
use crate::tasks::{Task, TaskState};
use crate::PROTOCOL_VERSION;

/// Envelope type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    TaskAssignment,
    StatusUpdate,
    TaskCompletion,
    Ping,
    Error,
}

impl MessageType {
    /// Wire name of this type (`task_assignment`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskAssignment => "task_assignment",
            Self::StatusUpdate => "status_update",
            Self::TaskCompletion => "task_completion",
            Self::Ping => "ping",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_version() -> String {
    PROTOCOL_VERSION.to_string()
}

fn default_payload() -> Value {
    Value::Object(Map::new())
}

/// A versioned protocol message between two agents.
///
/// Constructed locally when sending (identifier, timestamp, and version are
/// populated at construction time) or decoded from a wire value when
/// receiving. Immutable once validated. The `signature` field is opaque
/// pass-through data; verification belongs to the transport collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version; only [`PROTOCOL_VERSION`] is accepted inbound.
    #[serde(default = "default_version")]
    pub version: String,
    /// Unique message identifier (UUID syntax).
    pub message_id: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    /// Sender agent identifier.
    #[serde(rename = "from")]
    pub from_agent: String,
    /// Recipient agent identifier.
    #[serde(rename = "to")]
    pub to_agent: String,
    /// Declared type; governs the payload contract.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Type-dependent payload.
    #[serde(default = "default_payload")]
    pub payload: Value,
    /// Opaque signature, unvalidated by the core.
    #[serde(default)]
    pub signature: Option<String>,
}

impl Envelope {
    /// Create an envelope with a fresh message id and timestamp.
    pub fn new(
        from_agent: impl Into<String>,
        to_agent: impl Into<String>,
        message_type: MessageType,
        payload: Value,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            from_agent: from_agent.into(),
            to_agent: to_agent.into(),
            message_type,
            payload,
            signature: None,
        }
    }

    /// Decode an envelope from a wire value.
    ///
    /// A structurally alien value (missing top-level field, wrong shape,
    /// unknown type tag) is an `InvalidEnvelope` error, never a panic.
    pub fn from_value(value: Value) -> Result<Self, BridgeError> {
        serde_json::from_value(value).map_err(|err| BridgeError::InvalidEnvelope {
            reason: err.to_string(),
        })
    }

    /// Encode to the wire value.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Outbound constructors
    // -----------------------------------------------------------------------

    /// Build a task-assignment envelope from a stored task record.
    pub fn task_assignment(
        from_agent: impl Into<String>,
        to_agent: impl Into<String>,
        task: &Task,
    ) -> Self {
        let mut payload = json!({
            "task_id": task.id.to_string(),
            "task_type": task.task_type,
            "title": task.title,
            "description": task.description,
            "payload": task.payload,
            "priority": task.priority.as_str(),
        });
        if let Some(deadline) = task.deadline {
            payload["deadline"] = json!(deadline.to_rfc3339());
        }
        if !task.metadata.is_empty() {
            payload["metadata"] = Value::Object(task.metadata.clone());
        }
        Self::new(from_agent, to_agent, MessageType::TaskAssignment, payload)
    }

    /// Build a status-update envelope.
    pub fn status_update(
        from_agent: impl Into<String>,
        to_agent: impl Into<String>,
        task_id: &str,
        status: TaskState,
        progress: Option<f64>,
        message: Option<&str>,
        metadata: Option<Map<String, Value>>,
    ) -> Self {
        let mut payload = json!({
            "task_id": task_id,
            "status": status.as_str(),
        });
        if let Some(progress) = progress {
            payload["progress"] = json!(progress);
        }
        if let Some(message) = message {
            payload["message"] = json!(message);
        }
        if let Some(metadata) = metadata {
            payload["metadata"] = Value::Object(metadata);
        }
        Self::new(from_agent, to_agent, MessageType::StatusUpdate, payload)
    }

    /// Build a task-completion envelope carrying the result.
    pub fn task_completion(
        from_agent: impl Into<String>,
        to_agent: impl Into<String>,
        task_id: &str,
        result: Value,
        execution_time_ms: Option<u64>,
        metadata: Option<Map<String, Value>>,
    ) -> Self {
        let mut payload = json!({
            "task_id": task_id,
            "status": "completed",
            "result": result,
        });
        if let Some(ms) = execution_time_ms {
            payload["execution_time_ms"] = json!(ms);
        }
        if let Some(metadata) = metadata {
            payload["metadata"] = Value::Object(metadata);
        }
        Self::new(from_agent, to_agent, MessageType::TaskCompletion, payload)
    }

    /// Build a ping envelope. A nonce is generated when none is supplied.
    pub fn ping(
        from_agent: impl Into<String>,
        to_agent: impl Into<String>,
        nonce: Option<&str>,
        echo: Option<Value>,
    ) -> Self {
        let mut payload = json!({
            "nonce": nonce.map(|n| n.to_string()).unwrap_or_else(|| Uuid::new_v4().to_string()),
        });
        if let Some(echo) = echo {
            payload["echo"] = echo;
        }
        Self::new(from_agent, to_agent, MessageType::Ping, payload)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::validate::validate_envelope;
    use crate::tasks::TaskPriority;

    #[test]
    fn test_wire_field_names() {
        let env = Envelope::new("agent-1", "agent-2", MessageType::Ping, json!({"nonce": "n"}));
        let value = env.to_value();

        assert_eq!(value["version"], PROTOCOL_VERSION);
        assert_eq!(value["from"], "agent-1");
        assert_eq!(value["to"], "agent-2");
        assert_eq!(value["type"], "ping");
        assert_eq!(value["signature"], Value::Null);
        assert!(value.get("from_agent").is_none());
    }

    #[test]
    fn test_round_trip() {
        let env = Envelope::new(
            "agent-1",
            "agent-2",
            MessageType::StatusUpdate,
            json!({"task_id": "t-1", "status": "assigned"}),
        );
        let back = Envelope::from_value(env.to_value()).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn test_fresh_id_and_timestamp_per_construction() {
        let a = Envelope::new("x", "y", MessageType::Ping, json!({}));
        let b = Envelope::new("x", "y", MessageType::Ping, json!({}));
        assert_ne!(a.message_id, b.message_id);
    }

    #[test]
    fn test_decode_unknown_type() {
        let value = json!({
            "version": "1.0.0",
            "message_id": Uuid::new_v4().to_string(),
            "timestamp": Utc::now().to_rfc3339(),
            "from": "agent-1",
            "to": "agent-2",
            "type": "handshake",
            "payload": {},
            "signature": null,
        });
        let err = Envelope::from_value(value).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidEnvelope { .. }));
    }

    #[test]
    fn test_decode_missing_field() {
        let value = json!({
            "version": "1.0.0",
            "message_id": Uuid::new_v4().to_string(),
            "timestamp": Utc::now().to_rfc3339(),
            "type": "ping",
            "payload": {"nonce": "n"},
        });
        let err = Envelope::from_value(value).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidEnvelope { .. }));
    }

    #[test]
    fn test_decode_defaults_version_and_payload() {
        let value = json!({
            "message_id": Uuid::new_v4().to_string(),
            "timestamp": Utc::now().to_rfc3339(),
            "from": "agent-1",
            "to": "agent-2",
            "type": "error",
        });
        let env = Envelope::from_value(value).unwrap();
        assert_eq!(env.version, PROTOCOL_VERSION);
        assert_eq!(env.payload, json!({}));
        assert!(env.signature.is_none());
    }

    #[test]
    fn test_task_assignment_constructor_is_valid() {
        let mut task = Task::new("research", "Survey", "Survey the field", json!({"x": 1}));
        task.priority = TaskPriority::High;
        task.metadata.insert("origin".to_string(), json!("planner"));

        let env = Envelope::task_assignment("agent-1", "agent-2", &task);
        assert_eq!(env.message_type, MessageType::TaskAssignment);
        assert_eq!(env.payload["task_id"], task.id.to_string());
        assert_eq!(env.payload["priority"], "high");
        assert_eq!(env.payload["metadata"]["origin"], "planner");
        validate_envelope(&env).unwrap();
    }

    #[test]
    fn test_status_update_constructor_is_valid() {
        let env = Envelope::status_update(
            "agent-2",
            "agent-1",
            "t-1",
            TaskState::InProgress,
            Some(0.4),
            Some("halfway"),
            None,
        );
        assert_eq!(env.payload["status"], "in_progress");
        assert_eq!(env.payload["progress"], 0.4);
        assert_eq!(env.payload["message"], "halfway");
        validate_envelope(&env).unwrap();
    }

    #[test]
    fn test_task_completion_constructor_is_valid() {
        let env = Envelope::task_completion(
            "agent-2",
            "agent-1",
            "t-1",
            json!({"answer": 42}),
            Some(1200),
            None,
        );
        assert_eq!(env.payload["status"], "completed");
        assert_eq!(env.payload["result"]["answer"], 42);
        assert_eq!(env.payload["execution_time_ms"], 1200);
        validate_envelope(&env).unwrap();
    }

    #[test]
    fn test_ping_generates_nonce() {
        let env = Envelope::ping("agent-1", "agent-2", None, Some(json!("echo me")));
        assert!(env.payload["nonce"].as_str().is_some_and(|n| !n.is_empty()));
        assert_eq!(env.payload["echo"], "echo me");
        validate_envelope(&env).unwrap();

        let env = Envelope::ping("agent-1", "agent-2", Some("n-1"), None);
        assert_eq!(env.payload["nonce"], "n-1");
    }
}
