//! Bulk mutation reporting
//!
//! Batch operations apply a single-task operation to each id in turn. A
//! failed item is recorded and the walk continues; nothing already applied
//! is rolled back. Only request-level validation (id shape, batch size)
//! rejects the whole batch, and it does so before any mutation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::domain::{Task, TaskStatus, validate_id};
use crate::error::{TaskError, TaskResult};

/// Default cap on ids per batch
pub const DEFAULT_MAX_IDS: usize = 500;

/// A task the batch changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub task_id: String,
    pub status: TaskStatus,
    pub assigned_agent: Option<String>,
}

/// A task the batch could not change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemError {
    pub task_id: String,
    /// Machine-readable code, see [`TaskError::code`]
    pub code: String,
    pub message: String,
}

/// Per-item report for a best-effort batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BatchItem>,
    pub errors: Vec<BatchItemError>,
}

impl BatchResult {
    /// Fold one item's outcome into the report
    pub fn record(&mut self, task_id: &str, outcome: TaskResult<Task>) {
        match outcome {
            Ok(task) => {
                self.successful += 1;
                self.results.push(BatchItem {
                    task_id: task.id,
                    status: task.status,
                    assigned_agent: task.assigned_agent,
                });
            }
            Err(e) => {
                debug!(%task_id, code = e.code(), "BatchResult::record: item failed");
                self.failed += 1;
                self.errors.push(BatchItemError {
                    task_id: task_id.to_string(),
                    code: e.code().to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    pub fn total(&self) -> usize {
        self.successful + self.failed
    }
}

/// Validate a batch of task ids before dispatch
///
/// Rejects empty batches, batches over `max_ids`, any malformed id, and the
/// literal `bulk`. Duplicates are dropped keeping first occurrence.
pub fn validate_ids(ids: &[String], max_ids: usize) -> TaskResult<Vec<String>> {
    debug!(count = ids.len(), max_ids, "validate_ids: called");
    if ids.is_empty() {
        return Err(TaskError::validation("At least one task id is required"));
    }
    if ids.len() > max_ids {
        return Err(TaskError::validation(format!(
            "Batch of {} ids exceeds the limit of {}",
            ids.len(),
            max_ids
        )));
    }
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim();
        validate_id("task", id)?;
        if seen.insert(id.to_string()) {
            unique.push(id.to_string());
        }
    }
    Ok(unique)
}
