/**
 * Task Data Structures
 *
 * This module defines the task record handled by the sync layer and the
 * update events delivered over the realtime channel.
 *
 * The sync layer treats tasks as opaque payloads: only `id` and `title`
 * are typed, every other field (status, priority, metadata, ...) is kept
 * verbatim and round-trips unchanged.
 */
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single task as batched, cached and transmitted by the sync layer
///
/// # Example
/// ```rust
/// use tasksync::shared::Task;
///
/// let task = Task::new("t1", "Write release notes")
///     .with_field("priority", serde_json::json!("HIGH"));
///
/// assert_eq!(task.id, "t1");
/// assert_eq!(task.field("priority"), Some(&serde_json::json!("HIGH")));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Stable identifier, unique within a snapshot
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// Every other field, preserved as-is
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Task {
    /// Create a task with no additional fields
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            fields: Map::new(),
        }
    }

    /// Attach an additional opaque field
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Look up an additional field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Which aspect of a task an update event changes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    /// Workflow status changed
    Status,
    /// Priority changed
    Priority,
    /// Title or body changed
    Content,
}

/// Server-pushed task mutation
///
/// Wire format is camelCase JSON:
/// `{"taskId":"t1","type":"status","value":"done","timestamp":1700000000000,"userId":"u1"}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    /// Task the update applies to
    pub task_id: String,
    /// Aspect being changed
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    /// New value (arbitrary JSON)
    pub value: Value,
    /// Epoch milliseconds at which the change happened
    pub timestamp: i64,
    /// User who made the change
    pub user_id: String,
}
