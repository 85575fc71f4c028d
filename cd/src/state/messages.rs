//! State manager messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{Activity, Agent, Farmer, Role, Task, TaskStatus};

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Channel error")]
    ChannelError,
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Selection of tasks by indexed fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    /// Any of these statuses (empty = all)
    pub statuses: Vec<TaskStatus>,
    pub assigned_agent: Option<String>,
    /// Inclusive lower bound on scheduled_date
    pub date_from: Option<i64>,
    /// Inclusive upper bound on scheduled_date
    pub date_to: Option<i64>,
    /// At most this many tasks, in queue order (None = every match, by id)
    pub limit: Option<usize>,
    /// Queue-order rows to skip before `limit` applies
    pub offset: usize,
}

impl TaskQuery {
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            statuses: vec![status],
            ..Default::default()
        }
    }

    pub fn open_for_agent(agent_id: impl Into<String>) -> Self {
        Self {
            statuses: TaskStatus::OPEN.to_vec(),
            assigned_agent: Some(agent_id.into()),
            ..Default::default()
        }
    }

    pub fn between(mut self, date_from: Option<i64>, date_to: Option<i64>) -> Self {
        self.date_from = date_from;
        self.date_to = date_to;
        self
    }

    /// Bound the read to one queue-ordered window
    pub fn window(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    pub fn is_bounded(&self) -> bool {
        self.limit.is_some() || self.offset > 0
    }
}

/// Selection of agents by indexed fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentQuery {
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub team_lead: Option<String>,
}

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    // Task operations
    CreateTask {
        task: Task,
        reply: oneshot::Sender<StateResponse<String>>,
    },
    GetTask {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<Task>>>,
    },
    ListTasks {
        query: TaskQuery,
        reply: oneshot::Sender<StateResponse<Vec<Task>>>,
    },
    /// Unconditional write (last writer wins)
    UpdateTask {
        task: Task,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    /// Write applied only while the stored status equals `expected`
    UpdateTaskIf {
        task: Task,
        expected: TaskStatus,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    /// Batch of independent guarded writes; replies with rows modified
    UpdateTasksIf {
        items: Vec<(Task, TaskStatus)>,
        reply: oneshot::Sender<StateResponse<usize>>,
    },

    // Agent registry
    UpsertAgent {
        agent: Agent,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    GetAgent {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<Agent>>>,
    },
    ListAgents {
        query: AgentQuery,
        reply: oneshot::Sender<StateResponse<Vec<Agent>>>,
    },

    // Directories
    UpsertFarmer {
        farmer: Farmer,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    GetFarmers {
        ids: Vec<String>,
        reply: oneshot::Sender<StateResponse<Vec<Farmer>>>,
    },
    UpsertActivity {
        activity: Activity,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    GetActivities {
        ids: Vec<String>,
        reply: oneshot::Sender<StateResponse<Vec<Activity>>>,
    },

    // Shutdown
    Shutdown,
}
