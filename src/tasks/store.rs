//! Mutex-guarded task store and transition engine.
//!
//! Every public operation acquires the store lock for its entire
//! read-modify-write sequence, so two callers racing on the same task id
//! serialize rather than interleave. Query operations take the same lock
//! for their snapshot read and never observe a record mid-mutation.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::BridgeError;
use crate::tasks::task::{Task, TaskPriority, TaskState};

/// Legal state transitions. Terminal states have no successors.
static VALID_TRANSITIONS: Lazy<HashMap<TaskState, &'static [TaskState]>> = Lazy::new(|| {
    use TaskState::*;
    HashMap::from([
        (Created, &[Assigned, Cancelled][..]),
        (Assigned, &[InProgress, Cancelled, Failed][..]),
        (InProgress, &[Completed, Failed, Cancelled][..]),
        (Completed, &[][..]),
        (Failed, &[][..]),
        (Cancelled, &[][..]),
    ])
});

/// Whether `from -> to` appears in the transition table.
///
/// The legality check lives here, outside any one operation, so that it is
/// uniform across the store and independently testable.
pub fn transition_allowed(from: TaskState, to: TaskState) -> bool {
    VALID_TRANSITIONS
        .get(&from)
        .is_some_and(|targets| targets.contains(&to))
}

/// Owns task records and enforces the lifecycle state machine.
///
/// `assign`, `complete`, `cancel`, and `fail` layer narrower legality rules
/// on top of the generic table used by [`update_status`](Self::update_status)
/// (e.g. `complete` never accepts `Created` directly; an assignment must
/// occur first).
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Mutex<HashMap<Uuid, Task>>,
}

impl TaskStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Lifecycle operations
    // -----------------------------------------------------------------------

    /// Create a new task in the `Created` state and return a snapshot of it.
    ///
    /// Always succeeds for well-formed inputs; the identifier is freshly
    /// generated and unique within the store.
    pub fn create(
        &self,
        task_type: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        payload: Value,
        priority: TaskPriority,
        deadline: Option<DateTime<Utc>>,
        metadata: Option<Map<String, Value>>,
    ) -> Task {
        let mut task = Task::new(task_type, title, description, payload);
        task.priority = priority;
        task.deadline = deadline;
        if let Some(metadata) = metadata {
            task.metadata = metadata;
        }

        let mut tasks = self.tasks.lock().unwrap();
        tasks.insert(task.id, task.clone());
        task
    }

    /// Assign a task to an agent, transitioning `Created -> Assigned`.
    pub fn assign(&self, task_id: Uuid, agent_id: &str) -> Result<Task, BridgeError> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = Self::get_mut(&mut tasks, task_id)?;

        if task.state != TaskState::Created {
            return Err(BridgeError::InvalidTransition {
                reason: format!("cannot assign task in state {}", task.state),
            });
        }

        let now = Utc::now();
        task.state = TaskState::Assigned;
        task.assigned_to = Some(agent_id.to_string());
        task.assigned_at = Some(now);
        task.touch(now);
        Ok(task.clone())
    }

    /// Apply a generic transition per the table, with optional progress,
    /// status message, and metadata patch.
    ///
    /// `new_state` is the externally supplied wire name; unrecognized names
    /// fail with `InvalidTransition`. Progress is clamped into `[0.0, 1.0]`.
    /// The metadata patch is merged key-by-key: new keys added, existing
    /// keys overwritten.
    pub fn update_status(
        &self,
        task_id: Uuid,
        new_state: &str,
        progress: Option<f64>,
        message: Option<&str>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Task, BridgeError> {
        let target = TaskState::parse(new_state).ok_or_else(|| BridgeError::InvalidTransition {
            reason: format!("unknown task state: {new_state}"),
        })?;

        let mut tasks = self.tasks.lock().unwrap();
        let task = Self::get_mut(&mut tasks, task_id)?;

        if !transition_allowed(task.state, target) {
            return Err(BridgeError::InvalidTransition {
                reason: format!("{} -> {}", task.state, target),
            });
        }

        task.state = target;
        if let Some(progress) = progress {
            task.progress = progress.clamp(0.0, 1.0);
        }
        if let Some(message) = message {
            task.status_message = Some(message.to_string());
        }
        if let Some(patch) = metadata {
            for (key, value) in patch {
                task.metadata.insert(key, value);
            }
        }
        task.touch(Utc::now());
        Ok(task.clone())
    }

    /// Mark a task completed, transitioning `{Assigned, InProgress} -> Completed`.
    ///
    /// Stores the result and completion time; `execution_time_ms`, when
    /// given, is recorded under the `execution_time_ms` metadata key.
    pub fn complete(
        &self,
        task_id: Uuid,
        result: Value,
        execution_time_ms: Option<u64>,
    ) -> Result<Task, BridgeError> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = Self::get_mut(&mut tasks, task_id)?;

        if !matches!(task.state, TaskState::Assigned | TaskState::InProgress) {
            return Err(BridgeError::InvalidTransition {
                reason: format!("cannot complete task in state {}", task.state),
            });
        }

        let now = Utc::now();
        task.state = TaskState::Completed;
        task.result = Some(result);
        task.completed_at = Some(now);
        if let Some(ms) = execution_time_ms {
            task.metadata
                .insert("execution_time_ms".to_string(), Value::from(ms));
        }
        task.touch(now);
        Ok(task.clone())
    }

    /// Cancel a task from any non-terminal state, recording the reason in
    /// the status message.
    pub fn cancel(&self, task_id: Uuid, reason: &str) -> Result<Task, BridgeError> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = Self::get_mut(&mut tasks, task_id)?;

        if task.state.is_terminal() {
            return Err(BridgeError::InvalidTransition {
                reason: format!("cannot cancel task in state {}", task.state),
            });
        }

        task.state = TaskState::Cancelled;
        task.status_message = Some(format!("Cancelled: {reason}"));
        task.touch(Utc::now());
        Ok(task.clone())
    }

    /// Mark a task failed from any non-terminal state.
    pub fn fail(
        &self,
        task_id: Uuid,
        error: &str,
        error_details: Option<Map<String, Value>>,
    ) -> Result<Task, BridgeError> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = Self::get_mut(&mut tasks, task_id)?;

        if task.state.is_terminal() {
            return Err(BridgeError::InvalidTransition {
                reason: format!("cannot fail task in state {}", task.state),
            });
        }

        task.state = TaskState::Failed;
        task.error = Some(error.to_string());
        task.error_details = Some(error_details.unwrap_or_default());
        task.touch(Utc::now());
        Ok(task.clone())
    }

    /// Remove a task unconditionally. Returns whether a record existed.
    pub fn delete(&self, task_id: Uuid) -> bool {
        let mut tasks = self.tasks.lock().unwrap();
        tasks.remove(&task_id).is_some()
    }

    // -----------------------------------------------------------------------
    // Queries: point-in-time snapshots, no side effects
    // -----------------------------------------------------------------------

    /// Get a snapshot of a task by id.
    pub fn get(&self, task_id: Uuid) -> Option<Task> {
        let tasks = self.tasks.lock().unwrap();
        tasks.get(&task_id).cloned()
    }

    /// Snapshot of every task in the store.
    pub fn list(&self) -> Vec<Task> {
        let tasks = self.tasks.lock().unwrap();
        tasks.values().cloned().collect()
    }

    /// Tasks assigned to the given agent.
    pub fn tasks_for_agent(&self, agent_id: &str) -> Vec<Task> {
        let tasks = self.tasks.lock().unwrap();
        tasks
            .values()
            .filter(|task| task.assigned_to.as_deref() == Some(agent_id))
            .cloned()
            .collect()
    }

    /// Tasks in the state named by `state`. Unrecognized names yield an
    /// empty list.
    pub fn tasks_in_state(&self, state: &str) -> Vec<Task> {
        let Some(state) = TaskState::parse(state) else {
            return Vec::new();
        };
        let tasks = self.tasks.lock().unwrap();
        tasks
            .values()
            .filter(|task| task.state == state)
            .cloned()
            .collect()
    }

    /// All non-terminal tasks.
    pub fn active_tasks(&self) -> Vec<Task> {
        let tasks = self.tasks.lock().unwrap();
        tasks
            .values()
            .filter(|task| !task.state.is_terminal())
            .cloned()
            .collect()
    }

    /// Number of tasks currently in the store.
    pub fn len(&self) -> usize {
        let tasks = self.tasks.lock().unwrap();
        tasks.len()
    }

    /// Whether the store holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn get_mut(
        tasks: &mut HashMap<Uuid, Task>,
        task_id: Uuid,
    ) -> Result<&mut Task, BridgeError> {
        tasks.get_mut(&task_id).ok_or_else(|| BridgeError::TaskNotFound {
            task_id: task_id.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
