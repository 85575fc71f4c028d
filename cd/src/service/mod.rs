//! Task service
//!
//! The operation surface an API layer calls. Each operation authorizes the
//! caller, applies supervisor scope, runs the lifecycle transition, and
//! persists the result through the state actor. Agent-driven writes (load,
//! submit) are conditional on the prior status; supervisor writes (reassign,
//! override) are plain writes and the later one wins.

mod listing;

pub use listing::{Page, PageRequest, TaskFilters};

use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::allocator::{AllocationRequest, AllocationResult, Allocator};
use crate::auth::{Caller, Permission, authorize, ensure_supervises};
use crate::bulk::{BatchResult, validate_ids};
use crate::config::{Config, ListingConfig};
use crate::domain::{Activity, Agent, Farmer, Role, Task, TaskStatus, TaskView, sort_by_queue_order, validate_id};
use crate::error::{TaskError, TaskResult};
use crate::lifecycle::{self, CallOutcome};
use crate::queue::WorkQueue;
use crate::registry::CapabilityRegistry;
use crate::state::{StateManager, TaskQuery};

/// Entry point for every task operation
#[derive(Clone)]
pub struct TaskService {
    state: StateManager,
    registry: CapabilityRegistry,
    allocator: Allocator,
    queue: WorkQueue,
    listing: ListingConfig,
    max_bulk_ids: usize,
}

impl TaskService {
    pub fn new(state: StateManager, config: &Config) -> Self {
        debug!("TaskService::new: called");
        let registry = CapabilityRegistry::new(state.clone());
        let allocator = Allocator::new(state.clone(), registry.clone())
            .with_candidate_cap(config.allocation.candidate_cap)
            .with_all_tokens(config.allocation.all_languages_tokens.clone());
        let queue = WorkQueue::new(state.clone(), registry.clone());
        Self {
            state,
            registry,
            allocator,
            queue,
            listing: config.listing.clone(),
            max_bulk_ids: config.bulk.max_ids,
        }
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Build a caller from the agent record with this id
    pub async fn resolve_caller(&self, id: &str) -> TaskResult<Caller> {
        let agent = self.registry.get_agent(id).await?;
        Ok(Caller::from(&agent))
    }

    // === Registry and directory population ===

    pub async fn register_agent(&self, agent: Agent) -> TaskResult<()> {
        debug!(agent_id = %agent.id, "register_agent: called");
        validate_id("agent", &agent.id)?;
        Ok(self.state.upsert_agent(agent).await?)
    }

    pub async fn register_farmer(&self, farmer: Farmer) -> TaskResult<()> {
        debug!(farmer_id = %farmer.id, "register_farmer: called");
        validate_id("farmer", &farmer.id)?;
        Ok(self.state.upsert_farmer(farmer).await?)
    }

    pub async fn register_activity(&self, activity: Activity) -> TaskResult<()> {
        debug!(activity_id = %activity.id, "register_activity: called");
        validate_id("activity", &activity.id)?;
        Ok(self.state.upsert_activity(activity).await?)
    }

    /// Store a new task; it must honor the assignment invariant
    pub async fn create_task(&self, task: Task) -> TaskResult<String> {
        debug!(task_id = %task.id, "create_task: called");
        validate_id("task", &task.id)?;
        if (task.status == TaskStatus::Unassigned) != task.assigned_agent.is_none() {
            return Err(TaskError::validation(format!(
                "Task {} must have an agent exactly when it is not unassigned",
                task.id
            )));
        }
        Ok(self.state.create_task(task).await?)
    }

    // === Reads ===

    pub async fn get_task(&self, caller: &Caller, task_id: &str) -> TaskResult<TaskView> {
        debug!(caller = %caller.id, %task_id, "get_task: called");
        let task = self.fetch(task_id).await?;
        match caller.role {
            Role::Admin => {}
            Role::Agent => {
                if !task.is_assigned_to(&caller.id) {
                    return Err(TaskError::Forbidden(format!(
                        "Task {} is not assigned to agent {}",
                        task.id, caller.id
                    )));
                }
            }
            Role::TeamLead => self.ensure_task_in_scope(caller, &task).await?,
        }
        self.view(task).await
    }

    // === Allocation ===

    pub async fn allocate(&self, caller: &Caller, request: AllocationRequest) -> TaskResult<AllocationResult> {
        debug!(caller = %caller.id, ?request, "allocate: called");
        authorize(caller, Permission::AllocateTasks)?;
        self.allocator.allocate(&request, caller.supervisor_scope()).await
    }

    // === Agent work queue ===

    pub async fn next_task_for_agent(&self, caller: &Caller, agent_id: &str) -> TaskResult<Option<TaskView>> {
        debug!(caller = %caller.id, %agent_id, "next_task_for_agent: called");
        authorize(caller, Permission::WorkQueue)?;
        ensure_self(caller, agent_id)?;
        self.queue.next_task_for_agent(agent_id).await
    }

    pub async fn available_tasks_for_agent(&self, caller: &Caller, agent_id: &str) -> TaskResult<Vec<TaskView>> {
        debug!(caller = %caller.id, %agent_id, "available_tasks_for_agent: called");
        if caller.id == agent_id {
            authorize(caller, Permission::WorkQueue)?;
        } else {
            authorize(caller, Permission::ViewTeamTasks)?;
            self.ensure_agent_in_scope(caller, agent_id).await?;
        }
        self.queue.available_tasks_for_agent(agent_id).await
    }

    /// sampled_in_queue -> in_progress for the calling agent
    pub async fn load_task(&self, caller: &Caller, task_id: &str) -> TaskResult<TaskView> {
        debug!(caller = %caller.id, %task_id, "load_task: called");
        authorize(caller, Permission::WorkQueue)?;
        let task = self.fetch(task_id).await?;
        let task = self.queue.load(task, &caller.id).await?;
        self.view(task).await
    }

    /// in_progress -> terminal, recording the call log
    pub async fn submit_call_outcome(
        &self,
        caller: &Caller,
        task_id: &str,
        outcome: CallOutcome,
    ) -> TaskResult<TaskView> {
        debug!(caller = %caller.id, %task_id, call_status = %outcome.call_status, "submit_call_outcome: called");
        authorize(caller, Permission::WorkQueue)?;
        outcome.validate()?;
        let mut task = self.fetch(task_id).await?;
        let prior = lifecycle::submit(&mut task, &caller.id, outcome)?;
        if !self.state.update_task_if(task.clone(), prior).await? {
            warn!(%task_id, agent_id = %caller.id, "submit_call_outcome: conditional write matched no rows");
            return Err(TaskError::RaceLost(task.id));
        }
        info!(%task_id, agent_id = %caller.id, status = %task.status, "Call outcome submitted");
        self.view(task).await
    }

    // === Supervisor actions ===

    pub async fn reassign_task(&self, caller: &Caller, task_id: &str, new_agent_id: &str) -> TaskResult<TaskView> {
        debug!(caller = %caller.id, %task_id, %new_agent_id, "reassign_task: called");
        authorize(caller, Permission::ReassignTasks)?;
        let target = self.reassign_target(caller, new_agent_id).await?;
        let task = self.reassign_one(caller, task_id, &target).await?;
        self.view(task).await
    }

    pub async fn override_status(
        &self,
        caller: &Caller,
        task_id: &str,
        status: TaskStatus,
        notes: Option<String>,
    ) -> TaskResult<TaskView> {
        debug!(caller = %caller.id, %task_id, %status, "override_status: called");
        authorize(caller, Permission::OverrideStatus)?;
        let task = self.override_one(caller, task_id, status, notes).await?;
        self.view(task).await
    }

    pub async fn bulk_reassign(&self, caller: &Caller, task_ids: &[String], agent_id: &str) -> TaskResult<BatchResult> {
        debug!(caller = %caller.id, count = task_ids.len(), %agent_id, "bulk_reassign: called");
        authorize(caller, Permission::ReassignTasks)?;
        let ids = validate_ids(task_ids, self.max_bulk_ids)?;
        let target = self.reassign_target(caller, agent_id).await?;

        let mut report = BatchResult::default();
        for id in &ids {
            let outcome = self.reassign_one(caller, id, &target).await;
            report.record(id, outcome);
        }
        info!(
            agent_id,
            successful = report.successful,
            failed = report.failed,
            "Bulk reassign complete"
        );
        Ok(report)
    }

    pub async fn bulk_override_status(
        &self,
        caller: &Caller,
        task_ids: &[String],
        status: TaskStatus,
        notes: Option<String>,
    ) -> TaskResult<BatchResult> {
        debug!(caller = %caller.id, count = task_ids.len(), %status, "bulk_override_status: called");
        authorize(caller, Permission::OverrideStatus)?;
        let ids = validate_ids(task_ids, self.max_bulk_ids)?;
        if status == TaskStatus::Unassigned {
            return Err(TaskError::validation(
                "Status override cannot return a task to unassigned",
            ));
        }

        let mut report = BatchResult::default();
        for id in &ids {
            let outcome = self.override_one(caller, id, status, notes.clone()).await;
            report.record(id, outcome);
        }
        info!(
            %status,
            successful = report.successful,
            failed = report.failed,
            "Bulk status override complete"
        );
        Ok(report)
    }

    // === Listings ===

    /// Open tasks: agents see their own, team leads their team's, admins all
    pub async fn list_pending_tasks(
        &self,
        caller: &Caller,
        filters: TaskFilters,
        page: PageRequest,
    ) -> TaskResult<Page<TaskView>> {
        debug!(caller = %caller.id, ?filters, ?page, "list_pending_tasks: called");
        let statuses = match filters.status {
            None => TaskStatus::OPEN.to_vec(),
            Some(status) if status.is_open() => vec![status],
            Some(status) => {
                return Err(TaskError::validation(format!("Status {} is not a pending status", status)));
            }
        };

        let mut agent_filter = filters.agent_id.clone();
        let mut team: Option<HashSet<String>> = None;
        match caller.role {
            Role::Agent => {
                authorize(caller, Permission::WorkQueue)?;
                if let Some(ref agent_id) = agent_filter {
                    ensure_self(caller, agent_id)?;
                }
                agent_filter = Some(caller.id.clone());
            }
            Role::TeamLead => {
                authorize(caller, Permission::ViewTeamTasks)?;
                let members = self.team_ids(&caller.id).await?;
                if let Some(ref agent_id) = agent_filter
                    && !members.contains(agent_id)
                {
                    return Err(not_in_team(agent_id, &caller.id));
                }
                team = Some(members);
            }
            Role::Admin => authorize(caller, Permission::ViewAllTasks)?,
        }

        let query = TaskQuery {
            statuses,
            assigned_agent: agent_filter,
            date_from: filters.date_from,
            date_to: filters.date_to,
            ..Default::default()
        };
        let tasks = self.in_team(self.state.list_tasks(query).await?, team.as_ref());
        self.page_of(tasks, &filters, page).await
    }

    /// Tasks of any status assigned to agents of one team
    pub async fn list_team_tasks(
        &self,
        caller: &Caller,
        team_lead_id: &str,
        filters: TaskFilters,
        page: PageRequest,
    ) -> TaskResult<Page<TaskView>> {
        debug!(caller = %caller.id, %team_lead_id, ?filters, ?page, "list_team_tasks: called");
        authorize(caller, Permission::ViewTeamTasks)?;
        if let Some(lead) = caller.supervisor_scope()
            && lead != team_lead_id
        {
            return Err(TaskError::Forbidden(format!(
                "{} may only list their own team, not {}",
                lead, team_lead_id
            )));
        }
        let members = self.team_ids(team_lead_id).await?;
        if let Some(ref agent_id) = filters.agent_id
            && !members.contains(agent_id)
        {
            return Err(not_in_team(agent_id, team_lead_id));
        }

        let query = TaskQuery {
            statuses: filters.status.into_iter().collect(),
            assigned_agent: filters.agent_id.clone(),
            date_from: filters.date_from,
            date_to: filters.date_to,
            ..Default::default()
        };
        let tasks = self.in_team(self.state.list_tasks(query).await?, Some(&members));
        self.page_of(tasks, &filters, page).await
    }

    /// The pool waiting for the allocator
    pub async fn list_unassigned_tasks(
        &self,
        caller: &Caller,
        filters: TaskFilters,
        page: PageRequest,
    ) -> TaskResult<Page<TaskView>> {
        debug!(caller = %caller.id, ?filters, ?page, "list_unassigned_tasks: called");
        authorize(caller, Permission::ViewTeamTasks)?;
        if filters.status.is_some_and(|s| s != TaskStatus::Unassigned) {
            return Err(TaskError::validation("Unassigned listing cannot filter by another status"));
        }
        if filters.agent_id.is_some() {
            return Err(TaskError::validation("Unassigned tasks have no agent to filter by"));
        }
        let query = TaskQuery::with_status(TaskStatus::Unassigned).between(filters.date_from, filters.date_to);
        let tasks = self.state.list_tasks(query).await?;
        self.page_of(tasks, &filters, page).await
    }

    // === Helpers ===

    async fn fetch(&self, task_id: &str) -> TaskResult<Task> {
        validate_id("task", task_id)?;
        self.state
            .get_task(task_id)
            .await?
            .ok_or_else(|| TaskError::not_found("Task", task_id))
    }

    async fn view(&self, task: Task) -> TaskResult<TaskView> {
        let id = task.id.clone();
        self.state
            .resolve_views(vec![task])
            .await?
            .pop()
            .ok_or_else(|| TaskError::not_found("Task", id))
    }

    async fn team_ids(&self, team_lead: &str) -> TaskResult<HashSet<String>> {
        Ok(self
            .registry
            .team_members(team_lead)
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect())
    }

    fn in_team(&self, tasks: Vec<Task>, team: Option<&HashSet<String>>) -> Vec<Task> {
        match team {
            None => tasks,
            Some(members) => tasks
                .into_iter()
                .filter(|t| t.assigned_agent.as_ref().is_some_and(|a| members.contains(a)))
                .collect(),
        }
    }

    async fn page_of(&self, tasks: Vec<Task>, filters: &TaskFilters, page: PageRequest) -> TaskResult<Page<TaskView>> {
        let (page, limit) = page.resolve(self.listing.default_limit, self.listing.max_limit)?;
        let mut tasks = if filters.language.is_some() {
            let farmers = self.state.farmers_for(&tasks).await?;
            tasks
                .into_iter()
                .filter(|t| filters.matches_language(t, &farmers))
                .collect()
        } else {
            tasks
        };
        sort_by_queue_order(&mut tasks);
        let mut page = Page::slice(tasks, page, limit);
        let items = self.state.resolve_views(std::mem::take(&mut page.items)).await?;
        Ok(page.with_items(items))
    }

    /// Fail unless the agent exists and sits inside the caller's scope
    async fn ensure_agent_in_scope(&self, caller: &Caller, agent_id: &str) -> TaskResult<()> {
        if caller.supervisor_scope().is_none() {
            return Ok(());
        }
        let agent = self.registry.get_agent(agent_id).await?;
        ensure_supervises(caller, &agent)
    }

    /// Supervisors may act on unassigned tasks or tasks held by their team
    async fn ensure_task_in_scope(&self, caller: &Caller, task: &Task) -> TaskResult<()> {
        let Some(lead) = caller.supervisor_scope() else {
            return Ok(());
        };
        let Some(ref agent_id) = task.assigned_agent else {
            return Ok(());
        };
        match self.state.get_agent(agent_id).await? {
            Some(agent) if agent.is_supervised_by(lead) => Ok(()),
            _ => Err(TaskError::Forbidden(format!(
                "Task {} belongs to agent {} outside the team of {}",
                task.id, agent_id, lead
            ))),
        }
    }

    /// The agent a reassignment hands tasks to: existing, active, in scope
    async fn reassign_target(&self, caller: &Caller, agent_id: &str) -> TaskResult<Agent> {
        validate_id("agent", agent_id)?;
        let agent = self.registry.get_agent(agent_id).await?;
        if agent.role != Role::Agent {
            return Err(TaskError::validation(format!("{} is not a call-center agent", agent_id)));
        }
        if !agent.active {
            return Err(TaskError::validation(format!("Agent {} is inactive", agent_id)));
        }
        ensure_supervises(caller, &agent)?;
        Ok(agent)
    }

    async fn reassign_one(&self, caller: &Caller, task_id: &str, target: &Agent) -> TaskResult<Task> {
        let mut task = self.fetch(task_id).await?;
        self.ensure_task_in_scope(caller, &task).await?;
        lifecycle::reassign(&mut task, &target.id, &caller.id);
        self.state.update_task(task.clone()).await?;
        info!(%task_id, agent_id = %target.id, by = %caller.id, "Task reassigned");
        Ok(task)
    }

    async fn override_one(
        &self,
        caller: &Caller,
        task_id: &str,
        status: TaskStatus,
        notes: Option<String>,
    ) -> TaskResult<Task> {
        let mut task = self.fetch(task_id).await?;
        self.ensure_task_in_scope(caller, &task).await?;
        lifecycle::override_status(&mut task, status, notes, &caller.id)?;
        self.state.update_task(task.clone()).await?;
        info!(%task_id, %status, by = %caller.id, "Task status overridden");
        Ok(task)
    }
}

fn ensure_self(caller: &Caller, agent_id: &str) -> TaskResult<()> {
    if caller.id == agent_id {
        Ok(())
    } else {
        Err(TaskError::Forbidden(format!(
            "{} cannot work the queue of agent {}",
            caller.id, agent_id
        )))
    }
}

fn not_in_team(agent_id: &str, team_lead: &str) -> TaskError {
    TaskError::Forbidden(format!("Agent {} is not in the team of {}", agent_id, team_lead))
}
