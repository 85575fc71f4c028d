//! Call outcome submitted by an agent

use serde::{Deserialize, Serialize};

use crate::domain::{CallLog, Sentiment, TaskStatus};
use crate::error::{TaskError, TaskResult};

/// Raw outbound call status meaning the farmer did not pick up
pub const NOT_REACHABLE: &str = "Not Reachable";

/// Raw outbound call status meaning the number does not work
pub const INVALID_NUMBER: &str = "Invalid Number";

/// What the agent reports after a call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOutcome {
    /// Raw call status, e.g. "Connected", "Not Reachable", "Invalid Number"
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
}

impl CallOutcome {
    pub fn new(call_status: impl Into<String>) -> Self {
        Self {
            call_status: call_status.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> TaskResult<()> {
        if self.call_status.trim().is_empty() {
            return Err(TaskError::validation("Call status is required"));
        }
        Ok(())
    }

    /// Terminal status this outcome drives the task into
    pub fn terminal_status(&self) -> TaskStatus {
        let status = self.call_status.trim();
        if status.eq_ignore_ascii_case(NOT_REACHABLE) {
            TaskStatus::NotReachable
        } else if status.eq_ignore_ascii_case(INVALID_NUMBER) {
            TaskStatus::InvalidNumber
        } else {
            TaskStatus::Completed
        }
    }

    /// Stamp the outcome into a persisted call log
    pub fn into_call_log(self, recorded_by: &str, recorded_at: i64) -> CallLog {
        CallLog {
            call_status: self.call_status,
            recalled_activity: self.recalled_activity,
            purchased_product: self.purchased_product,
            willing_to_purchase: self.willing_to_purchase,
            comments: self.comments,
            sentiment: self.sentiment,
            call_duration_secs: self.call_duration_secs,
            recorded_at,
            recorded_by: recorded_by.to_string(),
        }
    }
}
