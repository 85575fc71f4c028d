//! Task domain type
//!
//! One farmer-outreach call work item tracked through a status lifecycle.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use taskstore::{IndexValue, Record, now_ms};
use tracing::debug;

use super::id::generate_id;
use crate::error::TaskError;

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for the allocator; no agent
    #[default]
    Unassigned,
    /// Assigned to an agent, not yet opened
    SampledInQueue,
    /// Opened by the assigned agent
    InProgress,
    /// Call completed with an outcome
    Completed,
    /// Farmer could not be reached
    NotReachable,
    /// Phone number is invalid
    InvalidNumber,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        Self::Unassigned,
        Self::SampledInQueue,
        Self::InProgress,
        Self::Completed,
        Self::NotReachable,
        Self::InvalidNumber,
    ];

    /// Statuses an agent still has work to do on
    pub const OPEN: [TaskStatus; 2] = [Self::SampledInQueue, Self::InProgress];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unassigned => "unassigned",
            Self::SampledInQueue => "sampled_in_queue",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::NotReachable => "not_reachable",
            Self::InvalidNumber => "invalid_number",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::NotReachable | Self::InvalidNumber)
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::SampledInQueue | Self::InProgress)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| TaskError::validation(format!("Unknown task status: '{}'", s)))
    }
}

/// Farmer sentiment captured on a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl std::str::FromStr for Sentiment {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            _ => Err(TaskError::validation(format!("Unknown sentiment: '{}'", s))),
        }
    }
}

/// One entry of a task's append-only audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEntry {
    /// When the entry was recorded (Unix milliseconds)
    pub timestamp: i64,
    pub status: TaskStatus,
    #[serde(default)]
    pub notes: Option<String>,
    /// Who caused the entry (agent, supervisor, or "allocator")
    #[serde(default)]
    pub actor: Option<String>,
}

/// Structured outcome recorded when an agent submits a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallLog {
    /// Raw call status as submitted (e.g. "Connected", "Not Reachable")
    pub call_status: String,
    #[serde(default)]
    pub recalled_activity: Option<bool>,
    #[serde(default)]
    pub purchased_product: Option<bool>,
    #[serde(default)]
    pub willing_to_purchase: Option<bool>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub call_duration_secs: Option<u32>,
    pub recorded_at: i64,
    pub recorded_by: String,
}

/// A call work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: String,

    /// Farmer to call
    pub farmer_id: String,

    /// Field activity that selected this farmer for outreach
    pub activity_id: String,

    /// Agent working the task; None exactly when status is unassigned
    pub assigned_agent: Option<String>,

    pub status: TaskStatus,

    /// Due date (Unix milliseconds)
    pub scheduled_date: i64,

    /// Append-only audit log
    #[serde(default)]
    pub interaction_history: Vec<InteractionEntry>,

    #[serde(default)]
    pub call_log: Option<CallLog>,

    /// Task this one is a scheduled callback of
    #[serde(default)]
    pub parent_task_id: Option<String>,

    /// Sequence number of the callback (1 = first callback)
    #[serde(default)]
    pub callback_number: Option<u32>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Task {
    /// Create an unassigned task with a generated ID
    pub fn new_unassigned(farmer_id: impl Into<String>, activity_id: impl Into<String>, scheduled_date: i64) -> Self {
        let farmer_id = farmer_id.into();
        let id = generate_id("task", &farmer_id);
        Self::with_id(id, farmer_id, activity_id, scheduled_date)
    }

    /// Create with a specific ID (for seeding or testing)
    pub fn with_id(
        id: impl Into<String>,
        farmer_id: impl Into<String>,
        activity_id: impl Into<String>,
        scheduled_date: i64,
    ) -> Self {
        let now = now_ms();
        Self {
            id: id.into(),
            farmer_id: farmer_id.into(),
            activity_id: activity_id.into(),
            assigned_agent: None,
            status: TaskStatus::Unassigned,
            scheduled_date,
            interaction_history: Vec::new(),
            call_log: None,
            parent_task_id: None,
            callback_number: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark as a scheduled callback of another task
    pub fn with_callback(mut self, parent_task_id: impl Into<String>, callback_number: u32) -> Self {
        self.parent_task_id = Some(parent_task_id.into());
        self.callback_number = Some(callback_number);
        self
    }

    /// Append an audit entry and bump `updated_at`
    pub(crate) fn record(&mut self, status: TaskStatus, notes: Option<String>, actor: &str) {
        debug!(%self.id, %status, %actor, "Task::record: called");
        let now = now_ms();
        self.interaction_history.push(InteractionEntry {
            timestamp: now,
            status,
            notes,
            actor: Some(actor.to_string()),
        });
        self.updated_at = now;
    }

    pub fn is_assigned_to(&self, agent_id: &str) -> bool {
        self.assigned_agent.as_deref() == Some(agent_id)
    }

    /// Queue order: earliest due first, then oldest, then id
    pub fn queue_key(&self) -> (i64, i64, &str) {
        (self.scheduled_date, self.created_at, self.id.as_str())
    }

    pub fn is_callback(&self) -> bool {
        self.parent_task_id.is_some()
    }
}

/// Sort tasks into queue order
pub(crate) fn sort_by_queue_order(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| a.queue_key().cmp(&b.queue_key()));
}

impl Record for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "tasks"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), IndexValue::String(self.status.to_string()));
        fields.insert("farmer_id".to_string(), IndexValue::String(self.farmer_id.clone()));
        fields.insert("activity_id".to_string(), IndexValue::String(self.activity_id.clone()));
        fields.insert("scheduled_date".to_string(), IndexValue::Int(self.scheduled_date));
        fields.insert("created_at".to_string(), IndexValue::Int(self.created_at));
        if let Some(ref agent) = self.assigned_agent {
            fields.insert("assigned_agent".to_string(), IndexValue::String(agent.clone()));
        }
        if let Some(ref parent) = self.parent_task_id {
            fields.insert("parent_task_id".to_string(), IndexValue::String(parent.clone()));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_new_unassigned() {
        let task = Task::new_unassigned("farmer-1", "act-1", 1000);
        assert!(task.id.contains("-task-farmer-1"));
        assert_eq!(task.status, TaskStatus::Unassigned);
        assert!(task.assigned_agent.is_none());
        assert!(task.interaction_history.is_empty());
        assert!(task.call_log.is_none());
        assert!(!task.is_callback());
    }

    #[test]
    fn test_task_status_parse() {
        assert_eq!("completed".parse::<TaskStatus>().unwrap(), TaskStatus::Completed);
        assert_eq!(" In Progress ".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("not-reachable".parse::<TaskStatus>().unwrap(), TaskStatus::NotReachable);
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_task_status_classes() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::InvalidNumber.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(TaskStatus::SampledInQueue.is_open());
        assert!(!TaskStatus::Unassigned.is_open());
    }

    #[test]
    fn test_task_status_serialization() {
        let json = serde_json::to_string(&TaskStatus::SampledInQueue).unwrap();
        assert_eq!(json, "\"sampled_in_queue\"");
        for status in TaskStatus::ALL {
            assert_eq!(status.to_string().parse::<TaskStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_record_appends_history() {
        let mut task = Task::with_id("t1", "f1", "a1", 0);
        task.record(TaskStatus::SampledInQueue, Some("allocated".into()), "allocator");
        task.record(TaskStatus::InProgress, None, "agent-1");
        assert_eq!(task.interaction_history.len(), 2);
        assert_eq!(task.interaction_history[0].status, TaskStatus::SampledInQueue);
        assert_eq!(task.interaction_history[1].actor.as_deref(), Some("agent-1"));
    }

    #[test]
    fn test_queue_order() {
        let mut a = Task::with_id("b", "f", "x", 10);
        a.created_at = 5;
        let mut b = Task::with_id("a", "f", "x", 10);
        b.created_at = 5;
        let mut c = Task::with_id("c", "f", "x", 5);
        c.created_at = 99;
        let mut tasks = vec![a, b, c];
        sort_by_queue_order(&mut tasks);
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_task_indexed_fields() {
        let mut task = Task::with_id("t1", "f1", "a1", 42).with_callback("t0", 1);
        let fields = task.indexed_fields();
        assert_eq!(fields.get("status"), Some(&IndexValue::String("unassigned".to_string())));
        assert_eq!(fields.get("scheduled_date"), Some(&IndexValue::Int(42)));
        assert_eq!(fields.get("created_at"), Some(&IndexValue::Int(task.created_at)));
        assert!(!fields.contains_key("assigned_agent"));
        assert_eq!(fields.get("parent_task_id"), Some(&IndexValue::String("t0".to_string())));

        task.assigned_agent = Some("agent-1".to_string());
        let fields = task.indexed_fields();
        assert_eq!(fields.get("assigned_agent"), Some(&IndexValue::String("agent-1".to_string())));
    }

    #[test]
    fn test_task_serde_defaults() {
        let json = r#"{"id":"t1","farmer_id":"f1","activity_id":"a1","assigned_agent":null,
            "status":"unassigned","scheduled_date":0,"created_at":0,"updated_at":0}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert!(task.interaction_history.is_empty());
        assert!(task.callback_number.is_none());
    }
}
