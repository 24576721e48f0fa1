//! Task record and lifecycle state definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Lifecycle state of a [`Task`].
///
/// The initial state is `Created`; `Completed`, `Failed`, and `Cancelled`
/// are terminal and accept no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Created,
    Assigned,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    /// Whether this state accepts no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Wire name of this state (`created`, `in_progress`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse a wire name. Returns `None` for unrecognized names.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "created" => Some(Self::Created),
            "assigned" => Some(Self::Assigned),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    /// Wire name of this priority.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    /// Parse a wire name. Returns `None` for unrecognized names.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of assignable, trackable work.
///
/// The serialized shape is the external task record contract:
/// `{id, task_type, title, description, payload, state, created_at,
/// updated_at, assigned_to, assigned_at, result, completed_at, progress,
/// status_message, priority, deadline, metadata, error, error_details}`.
///
/// Records are created through [`TaskStore::create`](crate::tasks::TaskStore::create)
/// and mutated exclusively through the store's transition operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, assigned at creation and immutable thereafter.
    pub id: Uuid,
    /// Caller-defined type tag.
    pub task_type: String,
    /// Short human-readable title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// Opaque task input.
    pub payload: Value,
    /// Current lifecycle state.
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every mutation; monotonically non-decreasing.
    pub updated_at: DateTime<Utc>,

    // Assignment
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,

    // Completion
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    // Progress
    /// Completion fraction, always within `[0.0, 1.0]`.
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub status_message: Option<String>,

    // Scheduling
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// Free-form metadata map.
    #[serde(default)]
    pub metadata: Map<String, Value>,

    // Failure
    /// Error message, populated only in the failed state.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_details: Option<Map<String, Value>>,
}

impl Task {
    /// Create a task in the `Created` state with a fresh id.
    ///
    /// Identifier and timestamps are computed here, at construction time.
    pub fn new(
        task_type: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        payload: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            task_type: task_type.into(),
            title: title.into(),
            description: description.into(),
            payload,
            state: TaskState::Created,
            created_at: now,
            updated_at: now,
            assigned_to: None,
            assigned_at: None,
            result: None,
            completed_at: None,
            progress: 0.0,
            status_message: None,
            priority: TaskPriority::default(),
            deadline: None,
            metadata: Map::new(),
            error: None,
            error_details: None,
        }
    }

    /// Refresh `updated_at`. Called by the store on every mutation.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Task(id={}, type={}, state={})",
            self.id, self.task_type, self.state
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
