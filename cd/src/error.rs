//! Error taxonomy for task operations

use thiserror::Error;

use crate::domain::TaskStatus;
use crate::state::StateError;

/// Errors returned by single-task operations and request validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Task {task_id} cannot {action} from status {status}")]
    InvalidState {
        task_id: String,
        status: TaskStatus,
        action: &'static str,
    },

    #[error("No active agents capable of language '{0}'")]
    NoCapableAgents(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Task {0} was modified concurrently")]
    RaceLost(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type TaskResult<T> = Result<T, TaskError>;

impl TaskError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// A lost conditional write means another worker already handled the task
    pub fn is_race_lost(&self) -> bool {
        matches!(self, Self::RaceLost(_))
    }

    /// Stable machine-readable code, used in batch reports
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidState { .. } => "invalid_state",
            Self::NoCapableAgents(_) => "no_capable_agents",
            Self::Validation(_) => "validation_error",
            Self::RaceLost(_) => "race_lost",
            Self::Store(_) => "store_error",
        }
    }
}

impl From<StateError> for TaskError {
    fn from(e: StateError) -> Self {
        match e {
            StateError::NotFound(id) => Self::NotFound { kind: "Record", id },
            other => Self::Store(other.to_string()),
        }
    }
}
