//! Agent work queue resolver
//!
//! Reads an agent's open tasks (sampled_in_queue or in_progress) in queue
//! order: earliest due, then oldest, then id. The order is a pure function
//! of the stored snapshot.

use tracing::{debug, info, warn};

use crate::domain::{Task, TaskStatus, TaskView, sort_by_queue_order};
use crate::error::{TaskError, TaskResult};
use crate::lifecycle::{self, LoadOutcome};
use crate::registry::CapabilityRegistry;
use crate::state::{StateManager, TaskQuery};

/// Resolves what an agent should work on
#[derive(Clone)]
pub struct WorkQueue {
    state: StateManager,
    registry: CapabilityRegistry,
}

impl WorkQueue {
    pub fn new(state: StateManager, registry: CapabilityRegistry) -> Self {
        Self { state, registry }
    }

    async fn open_tasks(&self, agent_id: &str) -> TaskResult<Vec<Task>> {
        self.registry.get_agent(agent_id).await?;
        let mut tasks = self.state.list_tasks(TaskQuery::open_for_agent(agent_id)).await?;
        sort_by_queue_order(&mut tasks);
        Ok(tasks)
    }

    /// Highest-priority open task, advanced to in_progress; None when the queue is empty
    pub async fn next_task_for_agent(&self, agent_id: &str) -> TaskResult<Option<TaskView>> {
        debug!(%agent_id, "next_task_for_agent: called");
        let Some(task) = self.open_tasks(agent_id).await?.into_iter().next() else {
            debug!(%agent_id, "next_task_for_agent: queue empty");
            return Ok(None);
        };
        let task = self.load(task, agent_id).await?;
        let mut views = self.state.resolve_views(vec![task]).await?;
        Ok(views.pop())
    }

    /// Every open task for the agent, callback metadata included
    pub async fn available_tasks_for_agent(&self, agent_id: &str) -> TaskResult<Vec<TaskView>> {
        debug!(%agent_id, "available_tasks_for_agent: called");
        let tasks = self.open_tasks(agent_id).await?;
        debug!(%agent_id, count = tasks.len(), "available_tasks_for_agent: resolved");
        Ok(self.state.resolve_views(tasks).await?)
    }

    /// Apply an agent load and persist it with a guarded write
    ///
    /// Losing the race is fine when the winner left the task in_progress for
    /// this same agent; the stored task is returned as-is.
    pub async fn load(&self, mut task: Task, agent_id: &str) -> TaskResult<Task> {
        debug!(%task.id, %agent_id, "load: called");
        match lifecycle::load(&mut task, agent_id)? {
            LoadOutcome::AlreadyInProgress => Ok(task),
            LoadOutcome::Advanced { expected } => {
                if self.state.update_task_if(task.clone(), expected).await? {
                    info!(task_id = %task.id, %agent_id, "Task loaded");
                    return Ok(task);
                }
                warn!(task_id = %task.id, %agent_id, "load: conditional write matched no rows");
                let current = self
                    .state
                    .get_task(&task.id)
                    .await?
                    .ok_or_else(|| TaskError::not_found("Task", &task.id))?;
                if current.status == TaskStatus::InProgress && current.is_assigned_to(agent_id) {
                    Ok(current)
                } else {
                    Err(TaskError::RaceLost(task.id))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Agent, Farmer};

    async fn setup() -> (StateManager, WorkQueue) {
        let state = StateManager::spawn_in_memory().unwrap();
        state.upsert_agent(Agent::new("agent-1", &["Hindi"])).await.unwrap();
        state.upsert_agent(Agent::new("agent-2", &["Hindi"])).await.unwrap();
        state.upsert_farmer(Farmer::new("f1", "Hindi").with_name("Ravi")).await.unwrap();

        let specs = [
            ("t-late", 300, 1, "agent-1", TaskStatus::SampledInQueue),
            ("t-b", 100, 5, "agent-1", TaskStatus::SampledInQueue),
            ("t-a", 100, 5, "agent-1", TaskStatus::SampledInQueue),
            ("t-done", 50, 1, "agent-1", TaskStatus::Completed),
            ("t-other", 10, 1, "agent-2", TaskStatus::InProgress),
        ];
        for (id, date, created, agent, status) in specs {
            let mut task = Task::with_id(id, "f1", "act-1", date);
            task.created_at = created;
            task.assigned_agent = Some(agent.to_string());
            task.status = status;
            state.create_task(task).await.unwrap();
        }
        let queue = WorkQueue::new(state.clone(), CapabilityRegistry::new(state.clone()));
        (state, queue)
    }

    #[tokio::test]
    async fn test_next_task_orders_and_advances() {
        let (state, queue) = setup().await;
        let view = queue.next_task_for_agent("agent-1").await.unwrap().unwrap();
        assert_eq!(view.task.id, "t-a");
        assert_eq!(view.task.status, TaskStatus::InProgress);
        assert_eq!(view.farmer.name, "Ravi");

        let stored = state.get_task_required("t-a").await.unwrap();
        assert_eq!(stored.status, TaskStatus::InProgress);
        assert_eq!(stored.interaction_history.len(), 1);

        // Same task again, no duplicate entry
        let again = queue.next_task_for_agent("agent-1").await.unwrap().unwrap();
        assert_eq!(again.task.id, "t-a");
        assert_eq!(
            state.get_task_required("t-a").await.unwrap().interaction_history.len(),
            1
        );
    }

    #[tokio::test]
    async fn test_next_task_empty_queue() {
        let (state, queue) = setup().await;
        state.upsert_agent(Agent::new("agent-3", &["Hindi"])).await.unwrap();
        assert!(queue.next_task_for_agent("agent-3").await.unwrap().is_none());
        assert_eq!(
            queue.next_task_for_agent("ghost").await.unwrap_err().code(),
            "not_found"
        );
    }

    #[tokio::test]
    async fn test_available_tasks() {
        let (state, queue) = setup().await;
        let mut callback = Task::with_id("t-cb", "f1", "act-1", 400).with_callback("t-done", 1);
        callback.assigned_agent = Some("agent-1".to_string());
        callback.status = TaskStatus::SampledInQueue;
        state.create_task(callback).await.unwrap();

        let views = queue.available_tasks_for_agent("agent-1").await.unwrap();
        let ids: Vec<&str> = views.iter().map(|v| v.task.id.as_str()).collect();
        assert_eq!(ids, vec!["t-a", "t-b", "t-late", "t-cb"]);
        assert_eq!(views[3].task.parent_task_id.as_deref(), Some("t-done"));
        assert_eq!(views[3].task.callback_number, Some(1));
        // Read-only
        assert_eq!(views[0].task.status, TaskStatus::SampledInQueue);
    }

    #[tokio::test]
    async fn test_load_race_returns_winner_state() {
        let (state, queue) = setup().await;
        let stale = state.get_task_required("t-a").await.unwrap();
        queue.load(stale.clone(), "agent-1").await.unwrap();

        // A second worker holding the stale copy loses the write but gets the task back
        let task = queue.load(stale, "agent-1").await.unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(
            state.get_task_required("t-a").await.unwrap().interaction_history.len(),
            1
        );
    }
}
