//! Task lifecycle state machine
//!
//! ```text
//! unassigned --allocate--> sampled_in_queue --load--> in_progress --submit--> completed
//!                                  ^                                      \-> not_reachable
//!                                  |                                       \-> invalid_number
//!                     reassign (from any status)
//! ```
//!
//! Transitions are pure functions over an in-memory [`Task`]. Each one checks
//! its precondition, mutates the task, appends exactly one history entry, and
//! returns the status the stored row must still hold for the write to apply.
//! Permission checks and persistence live in the service layer.

mod outcome;

pub use outcome::{CallOutcome, INVALID_NUMBER, NOT_REACHABLE};

use taskstore::now_ms;
use tracing::debug;

use crate::domain::{Task, TaskStatus};
use crate::error::{TaskError, TaskResult};

/// Actor name recorded for allocator entries
pub const ALLOCATOR_ACTOR: &str = "allocator";

/// Result of an agent load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// sampled_in_queue -> in_progress; persist with this guard
    Advanced { expected: TaskStatus },
    /// Already in_progress; nothing to write
    AlreadyInProgress,
}

fn invalid(task: &Task, action: &'static str) -> TaskError {
    TaskError::InvalidState {
        task_id: task.id.clone(),
        status: task.status,
        action,
    }
}

fn ensure_assigned_to(task: &Task, agent_id: &str) -> TaskResult<()> {
    if task.is_assigned_to(agent_id) {
        Ok(())
    } else {
        Err(TaskError::Forbidden(format!(
            "Task {} is not assigned to agent {}",
            task.id, agent_id
        )))
    }
}

/// unassigned -> sampled_in_queue
pub fn allocate(task: &mut Task, agent_id: &str, notes: impl Into<String>) -> TaskResult<TaskStatus> {
    debug!(%task.id, %agent_id, "allocate: called");
    if task.status != TaskStatus::Unassigned {
        return Err(invalid(task, "allocate"));
    }
    task.assigned_agent = Some(agent_id.to_string());
    task.status = TaskStatus::SampledInQueue;
    task.record(TaskStatus::SampledInQueue, Some(notes.into()), ALLOCATOR_ACTOR);
    Ok(TaskStatus::Unassigned)
}

/// sampled_in_queue -> in_progress; idempotent when already in_progress
pub fn load(task: &mut Task, agent_id: &str) -> TaskResult<LoadOutcome> {
    debug!(%task.id, %agent_id, status = %task.status, "load: called");
    ensure_assigned_to(task, agent_id)?;
    match task.status {
        TaskStatus::InProgress => {
            debug!("load: already in progress, no history entry");
            Ok(LoadOutcome::AlreadyInProgress)
        }
        TaskStatus::SampledInQueue => {
            task.status = TaskStatus::InProgress;
            task.record(TaskStatus::InProgress, Some("Task loaded by agent".to_string()), agent_id);
            Ok(LoadOutcome::Advanced {
                expected: TaskStatus::SampledInQueue,
            })
        }
        _ => Err(invalid(task, "load")),
    }
}

/// in_progress -> completed | not_reachable | invalid_number
///
/// The history entry carries the prior status; the call log and the new
/// status are written together.
pub fn submit(task: &mut Task, agent_id: &str, outcome: CallOutcome) -> TaskResult<TaskStatus> {
    debug!(%task.id, %agent_id, call_status = %outcome.call_status, "submit: called");
    outcome.validate()?;
    ensure_assigned_to(task, agent_id)?;
    if task.status != TaskStatus::InProgress {
        return Err(invalid(task, "submit"));
    }
    let prior = task.status;
    let next = outcome.terminal_status();
    let mut notes = format!("Call submitted: {}", outcome.call_status.trim());
    if let Some(comments) = outcome.comments.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        notes.push_str(" - ");
        notes.push_str(comments);
    }
    task.record(prior, Some(notes), agent_id);
    task.call_log = Some(outcome.into_call_log(agent_id, now_ms()));
    task.status = next;
    Ok(prior)
}

/// any -> sampled_in_queue with a new agent (reopens terminal tasks)
pub fn reassign(task: &mut Task, agent_id: &str, actor: &str) {
    debug!(%task.id, %agent_id, %actor, "reassign: called");
    let notes = match task.assigned_agent.as_deref() {
        Some(previous) => format!("Reassigned from {} to {} (was {})", previous, agent_id, task.status),
        None => format!("Assigned to {} (was {})", agent_id, task.status),
    };
    task.assigned_agent = Some(agent_id.to_string());
    task.status = TaskStatus::SampledInQueue;
    task.record(TaskStatus::SampledInQueue, Some(notes), actor);
}

/// any assigned status -> target (never unassigned)
pub fn override_status(task: &mut Task, target: TaskStatus, notes: Option<String>, actor: &str) -> TaskResult<()> {
    debug!(%task.id, %target, %actor, "override_status: called");
    if target == TaskStatus::Unassigned {
        return Err(TaskError::validation(
            "Status override cannot return a task to unassigned",
        ));
    }
    // Without an agent, leaving unassigned would break the assignment invariant
    if task.status == TaskStatus::Unassigned {
        return Err(invalid(task, "override status"));
    }
    let notes = notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("Status overridden from {} to {}", task.status, target));
    task.status = target;
    task.record(target, Some(notes), actor);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assigned(status: TaskStatus) -> Task {
        let mut task = Task::with_id("t1", "f1", "a1", 0);
        task.assigned_agent = Some("agent-1".to_string());
        task.status = status;
        task
    }

    #[test]
    fn test_allocate() {
        let mut task = Task::with_id("t1", "f1", "a1", 0);
        let expected = allocate(&mut task, "agent-1", "hindi").unwrap();
        assert_eq!(expected, TaskStatus::Unassigned);
        assert_eq!(task.status, TaskStatus::SampledInQueue);
        assert_eq!(task.assigned_agent.as_deref(), Some("agent-1"));
        assert_eq!(task.interaction_history.len(), 1);
        assert_eq!(task.interaction_history[0].actor.as_deref(), Some(ALLOCATOR_ACTOR));

        let err = allocate(&mut task, "agent-2", "hindi").unwrap_err();
        assert_eq!(err.code(), "invalid_state");
        assert_eq!(task.assigned_agent.as_deref(), Some("agent-1"));
    }

    #[test]
    fn test_load_twice_is_idempotent() {
        let mut task = assigned(TaskStatus::SampledInQueue);
        assert_eq!(
            load(&mut task, "agent-1").unwrap(),
            LoadOutcome::Advanced {
                expected: TaskStatus::SampledInQueue
            }
        );
        assert_eq!(load(&mut task, "agent-1").unwrap(), LoadOutcome::AlreadyInProgress);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.interaction_history.len(), 1);
    }

    #[test]
    fn test_load_wrong_agent_forbidden() {
        let mut task = assigned(TaskStatus::SampledInQueue);
        let err = load(&mut task, "agent-2").unwrap_err();
        assert_eq!(err.code(), "forbidden");
        assert_eq!(task.status, TaskStatus::SampledInQueue);
    }

    #[test]
    fn test_load_terminal_invalid() {
        let mut task = assigned(TaskStatus::Completed);
        assert_eq!(load(&mut task, "agent-1").unwrap_err().code(), "invalid_state");
    }

    #[test]
    fn test_submit_not_reachable() {
        let mut task = assigned(TaskStatus::InProgress);
        let prior = submit(&mut task, "agent-1", CallOutcome::new("Not Reachable")).unwrap();
        assert_eq!(prior, TaskStatus::InProgress);
        assert_eq!(task.status, TaskStatus::NotReachable);
        assert_eq!(task.call_log.as_ref().unwrap().call_status, "Not Reachable");
        assert_eq!(task.interaction_history.len(), 1);
        assert_eq!(task.interaction_history[0].status, TaskStatus::InProgress);
    }

    #[test]
    fn test_submit_requires_in_progress_and_owner() {
        let mut task = assigned(TaskStatus::SampledInQueue);
        assert_eq!(
            submit(&mut task, "agent-1", CallOutcome::new("Connected")).unwrap_err().code(),
            "invalid_state"
        );

        let mut task = assigned(TaskStatus::InProgress);
        assert_eq!(
            submit(&mut task, "agent-2", CallOutcome::new("Connected")).unwrap_err().code(),
            "forbidden"
        );
        assert!(task.call_log.is_none());
        assert!(task.interaction_history.is_empty());
    }

    #[test]
    fn test_reassign_reopens_completed() {
        let mut task = assigned(TaskStatus::Completed);
        reassign(&mut task, "agent-2", "lead-1");
        assert_eq!(task.status, TaskStatus::SampledInQueue);
        assert_eq!(task.assigned_agent.as_deref(), Some("agent-2"));
        let entry = &task.interaction_history[0];
        assert!(entry.notes.as_deref().unwrap().contains("agent-1"));
        assert_eq!(entry.actor.as_deref(), Some("lead-1"));
    }

    #[test]
    fn test_reassign_from_unassigned_keeps_invariant() {
        let mut task = Task::with_id("t1", "f1", "a1", 0);
        reassign(&mut task, "agent-2", "lead-1");
        assert_eq!(task.status, TaskStatus::SampledInQueue);
        assert!(task.assigned_agent.is_some());
    }

    #[test]
    fn test_override_status() {
        let mut task = assigned(TaskStatus::InProgress);
        override_status(&mut task, TaskStatus::InvalidNumber, Some("wrong digits".into()), "lead-1").unwrap();
        assert_eq!(task.status, TaskStatus::InvalidNumber);
        assert_eq!(task.interaction_history[0].notes.as_deref(), Some("wrong digits"));

        override_status(&mut task, TaskStatus::Completed, None, "lead-1").unwrap();
        assert!(
            task.interaction_history[1]
                .notes
                .as_deref()
                .unwrap()
                .contains("invalid_number to completed")
        );
    }

    #[test]
    fn test_override_never_to_or_from_unassigned() {
        let mut task = assigned(TaskStatus::Completed);
        assert_eq!(
            override_status(&mut task, TaskStatus::Unassigned, None, "lead-1")
                .unwrap_err()
                .code(),
            "validation_error"
        );

        let mut task = Task::with_id("t1", "f1", "a1", 0);
        assert_eq!(
            override_status(&mut task, TaskStatus::Completed, None, "lead-1")
                .unwrap_err()
                .code(),
            "invalid_state"
        );
        assert!(task.interaction_history.is_empty());
    }
}
