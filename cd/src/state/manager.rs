//! StateManager - actor that owns TaskStore
//!
//! Processes commands via channels for thread-safe access to persistent state.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::domain::{
    Activity, Agent, Farmer, Filter, FilterOp, IndexValue, Store, Task, TaskStatus, TaskView, sort_by_queue_order,
};

use super::messages::{AgentQuery, StateCommand, StateError, StateResponse, TaskQuery};

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Spawn a new StateManager actor over a store directory
    pub fn spawn(store_path: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(store_path = %store_path.as_ref().display(), "spawn: called");
        let store = Store::open(store_path.as_ref())?;
        Self::start(store)
    }

    /// Spawn over a throwaway in-memory store
    pub fn spawn_in_memory() -> eyre::Result<Self> {
        debug!("spawn_in_memory: called");
        Self::start(Store::open_in_memory()?)
    }

    fn start(mut store: Store) -> eyre::Result<Self> {
        // Index layout may have changed since the rows were written
        let task_count = store.rebuild_indexes::<Task>()?;
        let agent_count = store.rebuild_indexes::<Agent>()?;
        info!(task_count, agent_count, "Rebuilt indexes for Task and Agent records");

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(store, rx));
        info!("StateManager spawned");
        Ok(Self { tx })
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand,
    ) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(command(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    // === Task operations ===

    /// Create a new Task
    pub async fn create_task(&self, task: Task) -> StateResponse<String> {
        debug!(task_id = %task.id, status = %task.status, "create_task: called");
        self.request(|reply| StateCommand::CreateTask { task, reply }).await
    }

    /// Get a Task by ID
    pub async fn get_task(&self, id: &str) -> StateResponse<Option<Task>> {
        debug!(%id, "get_task: called");
        let id = id.to_string();
        self.request(|reply| StateCommand::GetTask { id, reply }).await
    }

    /// Get a Task by ID, returning error if not found
    pub async fn get_task_required(&self, id: &str) -> StateResponse<Task> {
        self.get_task(id)
            .await?
            .ok_or_else(|| StateError::NotFound(format!("Task {}", id)))
    }

    /// List Tasks matching a query (by id, or in queue order when windowed)
    pub async fn list_tasks(&self, query: TaskQuery) -> StateResponse<Vec<Task>> {
        debug!(?query, "list_tasks: called");
        self.request(|reply| StateCommand::ListTasks { query, reply }).await
    }

    /// Unconditional write
    pub async fn update_task(&self, task: Task) -> StateResponse<()> {
        debug!(task_id = %task.id, status = %task.status, "update_task: called");
        self.request(|reply| StateCommand::UpdateTask { task, reply }).await
    }

    /// Write only if the stored status is still `expected`
    pub async fn update_task_if(&self, task: Task, expected: TaskStatus) -> StateResponse<bool> {
        debug!(task_id = %task.id, %expected, next = %task.status, "update_task_if: called");
        self.request(|reply| StateCommand::UpdateTaskIf { task, expected, reply })
            .await
    }

    /// Batch of guarded writes; returns the number of rows actually modified
    pub async fn update_tasks_if(&self, items: Vec<(Task, TaskStatus)>) -> StateResponse<usize> {
        debug!(count = items.len(), "update_tasks_if: called");
        if items.is_empty() {
            return Ok(0);
        }
        self.request(|reply| StateCommand::UpdateTasksIf { items, reply }).await
    }

    // === Agent registry ===

    pub async fn upsert_agent(&self, agent: Agent) -> StateResponse<()> {
        debug!(agent_id = %agent.id, role = %agent.role, "upsert_agent: called");
        self.request(|reply| StateCommand::UpsertAgent { agent, reply }).await
    }

    pub async fn get_agent(&self, id: &str) -> StateResponse<Option<Agent>> {
        debug!(%id, "get_agent: called");
        let id = id.to_string();
        self.request(|reply| StateCommand::GetAgent { id, reply }).await
    }

    pub async fn list_agents(&self, query: AgentQuery) -> StateResponse<Vec<Agent>> {
        debug!(?query, "list_agents: called");
        self.request(|reply| StateCommand::ListAgents { query, reply }).await
    }

    // === Directories ===

    pub async fn upsert_farmer(&self, farmer: Farmer) -> StateResponse<()> {
        debug!(farmer_id = %farmer.id, "upsert_farmer: called");
        self.request(|reply| StateCommand::UpsertFarmer { farmer, reply }).await
    }

    pub async fn get_farmers(&self, ids: Vec<String>) -> StateResponse<Vec<Farmer>> {
        debug!(count = ids.len(), "get_farmers: called");
        self.request(|reply| StateCommand::GetFarmers { ids, reply }).await
    }

    pub async fn upsert_activity(&self, activity: Activity) -> StateResponse<()> {
        debug!(activity_id = %activity.id, "upsert_activity: called");
        self.request(|reply| StateCommand::UpsertActivity { activity, reply })
            .await
    }

    pub async fn get_activities(&self, ids: Vec<String>) -> StateResponse<Vec<Activity>> {
        debug!(count = ids.len(), "get_activities: called");
        self.request(|reply| StateCommand::GetActivities { ids, reply }).await
    }

    /// Farmers keyed by id for the farmers referenced by `tasks`
    pub async fn farmers_for(&self, tasks: &[Task]) -> StateResponse<HashMap<String, Farmer>> {
        let ids: BTreeSet<String> = tasks.iter().map(|t| t.farmer_id.clone()).collect();
        let farmers = self.get_farmers(ids.into_iter().collect()).await?;
        Ok(farmers.into_iter().map(|f| (f.id.clone(), f)).collect())
    }

    /// Resolve farmer and activity summaries for each task, preserving order
    pub async fn resolve_views(&self, tasks: Vec<Task>) -> StateResponse<Vec<TaskView>> {
        debug!(count = tasks.len(), "resolve_views: called");
        if tasks.is_empty() {
            return Ok(Vec::new());
        }
        let farmers = self.farmers_for(&tasks).await?;
        let activity_ids: BTreeSet<String> = tasks.iter().map(|t| t.activity_id.clone()).collect();
        let activities: HashMap<String, Activity> = self
            .get_activities(activity_ids.into_iter().collect())
            .await?
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();
        Ok(tasks
            .into_iter()
            .map(|task| TaskView::resolve(task, &farmers, &activities))
            .collect())
    }

    /// Shutdown the StateManager
    pub async fn shutdown(&self) -> Result<(), StateError> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

fn store_err(e: eyre::Report) -> StateError {
    StateError::StoreError(e.to_string())
}

fn status_guard(expected: TaskStatus) -> Filter {
    Filter::eq("status", expected.as_str())
}

fn task_filters(query: &TaskQuery, status: Option<TaskStatus>) -> Vec<Filter> {
    let mut filters = Vec::new();
    if let Some(status) = status {
        filters.push(status_guard(status));
    }
    if let Some(ref agent) = query.assigned_agent {
        filters.push(Filter::eq("assigned_agent", agent.as_str()));
    }
    if let Some(from) = query.date_from {
        filters.push(Filter::new("scheduled_date", FilterOp::Gte, from));
    }
    if let Some(to) = query.date_to {
        filters.push(Filter::new("scheduled_date", FilterOp::Lte, to));
    }
    filters
}

/// Indexed fields giving queue order; the store breaks ties by id
const QUEUE_ORDER: [&str; 2] = ["scheduled_date", "created_at"];

fn list_tasks(store: &Store, query: &TaskQuery) -> StateResponse<Vec<Task>> {
    if query.is_bounded() {
        return list_task_window(store, query);
    }
    if query.statuses.is_empty() {
        return store.list(&task_filters(query, None)).map_err(store_err);
    }
    let mut tasks = Vec::new();
    for status in &query.statuses {
        let batch: Vec<Task> = store.list(&task_filters(query, Some(*status))).map_err(store_err)?;
        tasks.extend(batch);
    }
    tasks.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(tasks)
}

/// One queue-ordered window; the store applies LIMIT/OFFSET itself
fn list_task_window(store: &Store, query: &TaskQuery) -> StateResponse<Vec<Task>> {
    match query.statuses.as_slice() {
        [] => store
            .list_page(&task_filters(query, None), &QUEUE_ORDER, query.limit, query.offset)
            .map_err(store_err),
        [status] => store
            .list_page(&task_filters(query, Some(*status)), &QUEUE_ORDER, query.limit, query.offset)
            .map_err(store_err),
        statuses => {
            // Each status contributes at most offset + limit rows to the merged window
            let per_status = query.limit.map(|l| l.saturating_add(query.offset));
            let mut tasks = Vec::new();
            for status in statuses {
                let batch: Vec<Task> = store
                    .list_page(&task_filters(query, Some(*status)), &QUEUE_ORDER, per_status, 0)
                    .map_err(store_err)?;
                tasks.extend(batch);
            }
            sort_by_queue_order(&mut tasks);
            Ok(tasks
                .into_iter()
                .skip(query.offset)
                .take(query.limit.unwrap_or(usize::MAX))
                .collect())
        }
    }
}

/// The actor loop that processes commands
async fn actor_loop(mut store: Store, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("actor_loop: started");
    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::CreateTask { task, reply } => {
                debug!(task_id = %task.id, "actor_loop: CreateTask command");
                let _ = reply.send(store.create(task).map_err(store_err));
            }

            StateCommand::GetTask { id, reply } => {
                debug!(%id, "actor_loop: GetTask command");
                let _ = reply.send(store.get(&id).map_err(store_err));
            }

            StateCommand::ListTasks { query, reply } => {
                debug!(?query, "actor_loop: ListTasks command");
                let _ = reply.send(list_tasks(&store, &query));
            }

            StateCommand::UpdateTask { task, reply } => {
                debug!(task_id = %task.id, "actor_loop: UpdateTask command");
                let id = task.id.clone();
                let result = store.update(task).map_err(|e| {
                    if e.to_string().starts_with("Record not found") {
                        StateError::NotFound(format!("Task {}", id))
                    } else {
                        store_err(e)
                    }
                });
                let _ = reply.send(result);
            }

            StateCommand::UpdateTaskIf { task, expected, reply } => {
                debug!(task_id = %task.id, %expected, "actor_loop: UpdateTaskIf command");
                let result = store.update_if(task, &status_guard(expected)).map_err(store_err);
                let _ = reply.send(result);
            }

            StateCommand::UpdateTasksIf { items, reply } => {
                debug!(count = items.len(), "actor_loop: UpdateTasksIf command");
                let guarded = items
                    .into_iter()
                    .map(|(task, expected)| (task, status_guard(expected)))
                    .collect();
                let _ = reply.send(store.update_many_if(guarded).map_err(store_err));
            }

            StateCommand::UpsertAgent { agent, reply } => {
                debug!(agent_id = %agent.id, "actor_loop: UpsertAgent command");
                let _ = reply.send(store.upsert(agent).map_err(store_err));
            }

            StateCommand::GetAgent { id, reply } => {
                debug!(%id, "actor_loop: GetAgent command");
                let _ = reply.send(store.get(&id).map_err(store_err));
            }

            StateCommand::ListAgents { query, reply } => {
                debug!(?query, "actor_loop: ListAgents command");
                let mut filters = Vec::new();
                if let Some(role) = query.role {
                    filters.push(Filter::eq("role", role.to_string()));
                }
                if let Some(active) = query.active {
                    filters.push(Filter::new("active", FilterOp::Eq, IndexValue::Bool(active)));
                }
                if let Some(lead) = query.team_lead {
                    filters.push(Filter::eq("team_lead", lead));
                }
                let _ = reply.send(store.list(&filters).map_err(store_err));
            }

            StateCommand::UpsertFarmer { farmer, reply } => {
                debug!(farmer_id = %farmer.id, "actor_loop: UpsertFarmer command");
                let _ = reply.send(store.upsert(farmer).map_err(store_err));
            }

            StateCommand::GetFarmers { ids, reply } => {
                debug!(count = ids.len(), "actor_loop: GetFarmers command");
                let _ = reply.send(store.get_many(&ids).map_err(store_err));
            }

            StateCommand::UpsertActivity { activity, reply } => {
                debug!(activity_id = %activity.id, "actor_loop: UpsertActivity command");
                let _ = reply.send(store.upsert(activity).map_err(store_err));
            }

            StateCommand::GetActivities { ids, reply } => {
                debug!(count = ids.len(), "actor_loop: GetActivities command");
                let _ = reply.send(store.get_many(&ids).map_err(store_err));
            }

            StateCommand::Shutdown => {
                debug!("actor_loop: Shutdown command");
                info!("StateManager shutting down");
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_state_manager_task_crud() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path()).unwrap();

        let task = Task::with_id("t1", "f1", "a1", 100);
        let id = manager.create_task(task.clone()).await.unwrap();
        assert_eq!(id, "t1");

        let retrieved = manager.get_task("t1").await.unwrap().unwrap();
        assert_eq!(retrieved.farmer_id, "f1");

        let mut updated = retrieved.clone();
        updated.status = TaskStatus::SampledInQueue;
        updated.assigned_agent = Some("agent-1".to_string());
        manager.update_task(updated).await.unwrap();

        let retrieved = manager.get_task_required("t1").await.unwrap();
        assert_eq!(retrieved.status, TaskStatus::SampledInQueue);

        assert!(manager.get_task("nope").await.unwrap().is_none());
        assert!(matches!(
            manager.get_task_required("nope").await,
            Err(StateError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_missing_task_is_not_found() {
        let manager = StateManager::spawn_in_memory().unwrap();
        let result = manager.update_task(Task::with_id("ghost", "f", "a", 0)).await;
        assert!(matches!(result, Err(StateError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_tasks_with_query() {
        let manager = StateManager::spawn_in_memory().unwrap();
        for (id, date) in [("t1", 10), ("t2", 20), ("t3", 30)] {
            manager.create_task(Task::with_id(id, "f", "a", date)).await.unwrap();
        }
        let mut assigned = Task::with_id("t4", "f", "a", 15);
        assigned.status = TaskStatus::InProgress;
        assigned.assigned_agent = Some("agent-1".to_string());
        manager.create_task(assigned).await.unwrap();

        let unassigned = manager
            .list_tasks(TaskQuery::with_status(TaskStatus::Unassigned).between(Some(15), Some(30)))
            .await
            .unwrap();
        let ids: Vec<&str> = unassigned.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t2", "t3"]);

        let open = manager.list_tasks(TaskQuery::open_for_agent("agent-1")).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, "t4");

        let all = manager.list_tasks(TaskQuery::default()).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_list_tasks_window_in_queue_order() {
        let manager = StateManager::spawn_in_memory().unwrap();
        for (id, date, created) in [("t1", 30, 0), ("t2", 10, 5), ("t3", 10, 1), ("t4", 20, 0)] {
            let mut task = Task::with_id(id, "f", "a", date);
            task.created_at = created;
            manager.create_task(task).await.unwrap();
        }
        let mut open = Task::with_id("t5", "f", "a", 15);
        open.status = TaskStatus::InProgress;
        open.assigned_agent = Some("agent-1".to_string());
        manager.create_task(open).await.unwrap();

        let ids = |tasks: Vec<Task>| tasks.into_iter().map(|t| t.id).collect::<Vec<_>>();
        let unassigned = TaskQuery::with_status(TaskStatus::Unassigned);

        let first = manager.list_tasks(unassigned.clone().window(2, 0)).await.unwrap();
        assert_eq!(ids(first), vec!["t3", "t2"]);
        let second = manager.list_tasks(unassigned.clone().window(2, 2)).await.unwrap();
        assert_eq!(ids(second), vec!["t4", "t1"]);
        assert!(manager.list_tasks(unassigned.window(2, 4)).await.unwrap().is_empty());

        let mixed = TaskQuery {
            statuses: vec![TaskStatus::Unassigned, TaskStatus::InProgress],
            ..Default::default()
        };
        let merged = manager.list_tasks(mixed.window(2, 1)).await.unwrap();
        assert_eq!(ids(merged), vec!["t2", "t5"]);
    }

    #[tokio::test]
    async fn test_guarded_updates() {
        let manager = StateManager::spawn_in_memory().unwrap();
        manager.create_task(Task::with_id("t1", "f", "a", 0)).await.unwrap();
        manager.create_task(Task::with_id("t2", "f", "a", 0)).await.unwrap();

        let mut claimed = manager.get_task_required("t1").await.unwrap();
        claimed.status = TaskStatus::SampledInQueue;
        claimed.assigned_agent = Some("agent-1".to_string());
        assert!(
            manager
                .update_task_if(claimed.clone(), TaskStatus::Unassigned)
                .await
                .unwrap()
        );
        assert!(!manager.update_task_if(claimed.clone(), TaskStatus::Unassigned).await.unwrap());

        let mut t2 = manager.get_task_required("t2").await.unwrap();
        t2.status = TaskStatus::SampledInQueue;
        t2.assigned_agent = Some("agent-2".to_string());
        let modified = manager
            .update_tasks_if(vec![(claimed, TaskStatus::Unassigned), (t2, TaskStatus::Unassigned)])
            .await
            .unwrap();
        assert_eq!(modified, 1);
        assert_eq!(manager.update_tasks_if(Vec::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_agent_registry_queries() {
        let manager = StateManager::spawn_in_memory().unwrap();
        manager.upsert_agent(Agent::team_lead("tl1")).await.unwrap();
        manager
            .upsert_agent(Agent::new("a1", &["Hindi"]).with_team_lead("tl1"))
            .await
            .unwrap();
        manager
            .upsert_agent(Agent::new("a2", &["Hindi"]).with_team_lead("tl1").inactive())
            .await
            .unwrap();
        manager
            .upsert_agent(Agent::new("a3", &["Hindi"]).with_team_lead("tl2"))
            .await
            .unwrap();

        let active_team = manager
            .list_agents(AgentQuery {
                role: Some(Role::Agent),
                active: Some(true),
                team_lead: Some("tl1".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(active_team.len(), 1);
        assert_eq!(active_team[0].id, "a1");

        let agents = manager
            .list_agents(AgentQuery {
                role: Some(Role::Agent),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(agents.len(), 3);
    }

    #[tokio::test]
    async fn test_resolve_views() {
        let manager = StateManager::spawn_in_memory().unwrap();
        manager
            .upsert_farmer(Farmer::new("f1", "Hindi").with_name("Ravi"))
            .await
            .unwrap();
        let tasks = vec![Task::with_id("t2", "f1", "a1", 0), Task::with_id("t1", "f9", "a1", 0)];
        let views = manager.resolve_views(tasks).await.unwrap();
        assert_eq!(views[0].task.id, "t2");
        assert_eq!(views[0].farmer.name, "Ravi");
        assert_eq!(views[1].farmer.name, crate::domain::UNKNOWN);
    }

    #[tokio::test]
    async fn test_shutdown_closes_channel() {
        let manager = StateManager::spawn_in_memory().unwrap();
        manager.shutdown().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(matches!(manager.get_task("t1").await, Err(StateError::ChannelError)));
    }
}
