//! Fair distribution allocator
//!
//! Resolves capable agents, selects unassigned candidates in queue order,
//! plans a round-robin distribution, and writes every assignment as one
//! batch of conditional updates guarded by `status == unassigned`. The
//! batch's modified count is the authoritative `allocated` figure.

mod planner;
mod request;

pub use planner::{Assignment, Plan, plan_all, plan_single};
pub use request::{AllocationRequest, LanguageSelector};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::domain::{Task, TaskStatus, language_key};
use crate::error::{TaskError, TaskResult};
use crate::lifecycle;
use crate::registry::{CapabilityRegistry, agent_buckets};
use crate::state::{StateManager, TaskQuery};

/// Default ceiling on candidates considered by one allocation
pub const DEFAULT_CANDIDATE_CAP: usize = 5000;

/// Summary of one allocation call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    /// Count asked for (0 = up to the cap)
    pub requested_count: usize,
    /// Candidates selected for this round, including skipped ones
    pub matched_tasks: usize,
    /// Rows actually moved out of unassigned
    pub allocated: usize,
    /// Agents that received at least one planned task, sorted
    pub agents_used: Vec<String>,
    /// Selected candidates left alone because no agent speaks their language
    pub skipped_by_language: BTreeMap<String, usize>,
}

/// Assigns unassigned tasks to capable agents
#[derive(Clone)]
pub struct Allocator {
    state: StateManager,
    registry: CapabilityRegistry,
    candidate_cap: usize,
    all_tokens: Vec<String>,
}

impl Allocator {
    pub fn new(state: StateManager, registry: CapabilityRegistry) -> Self {
        Self {
            state,
            registry,
            candidate_cap: DEFAULT_CANDIDATE_CAP,
            all_tokens: vec!["all".to_string(), "__all__".to_string()],
        }
    }

    pub fn with_candidate_cap(mut self, cap: usize) -> Self {
        self.candidate_cap = cap;
        self
    }

    pub fn with_all_tokens(mut self, tokens: Vec<String>) -> Self {
        self.all_tokens = tokens;
        self
    }

    /// Allocate within `scope` (a team lead's team, or everyone when None)
    pub async fn allocate(&self, request: &AllocationRequest, scope: Option<&str>) -> TaskResult<AllocationResult> {
        debug!(?request, ?scope, "allocate: called");
        request.validate()?;
        let selector = LanguageSelector::parse(&request.language, &self.all_tokens)?;
        let limit = request.limit(self.candidate_cap);

        let (candidates, plan) = match selector {
            LanguageSelector::Specific(ref language) => self.plan_language(language, request, scope, limit).await?,
            LanguageSelector::All => self.plan_all_languages(request, scope, limit).await?,
        };

        for (language, skipped) in &plan.skipped_by_language {
            warn!(%language, skipped, "allocate: no capable agent for language");
        }

        let agents_used: BTreeSet<String> = plan.assignments.iter().map(|a| a.agent_id.clone()).collect();
        let notes_label = selector.label();
        let mut writes = Vec::with_capacity(plan.assignments.len());
        for assignment in &plan.assignments {
            let mut task = candidates[assignment.index].clone();
            let notes = format!("Allocated to {} ({} round-robin)", assignment.agent_id, notes_label);
            let expected = lifecycle::allocate(&mut task, &assignment.agent_id, notes)?;
            writes.push((task, expected));
        }

        let planned = writes.len();
        let allocated = self.state.update_tasks_if(writes).await?;
        if allocated < planned {
            warn!(planned, allocated, "allocate: some tasks were claimed concurrently");
        }

        let result = AllocationResult {
            requested_count: request.count.unwrap_or(0),
            matched_tasks: plan.selected.len(),
            allocated,
            agents_used: agents_used.into_iter().collect(),
            skipped_by_language: plan.skipped_by_language,
        };
        info!(
            language = %notes_label,
            matched = result.matched_tasks,
            allocated = result.allocated,
            agents = result.agents_used.len(),
            "Allocation complete"
        );
        Ok(result)
    }

    async fn plan_language(
        &self,
        language: &str,
        request: &AllocationRequest,
        scope: Option<&str>,
        limit: usize,
    ) -> TaskResult<(Vec<Task>, Plan)> {
        debug!(%language, limit, "plan_language: called");
        let agents = self.registry.capable_agents(language, scope).await?;
        if agents.is_empty() {
            return Err(TaskError::NoCapableAgents(language.to_string()));
        }
        let agent_ids: Vec<String> = agents.into_iter().map(|a| a.id).collect();

        // Read the unassigned pool in cap-sized queue-ordered windows until
        // `limit` tasks match the language or the pool runs out
        let page_size = self.candidate_cap.max(1);
        let mut candidates: Vec<Task> = Vec::new();
        let mut offset = 0;
        while candidates.len() < limit {
            let batch = self
                .state
                .list_tasks(unassigned_query(request).window(page_size, offset))
                .await?;
            let fetched = batch.len();
            let farmers = self.state.farmers_for(&batch).await?;
            let room = limit - candidates.len();
            candidates.extend(
                batch
                    .into_iter()
                    .filter(|task| {
                        farmers
                            .get(&task.farmer_id)
                            .and_then(|f| f.preferred_language.as_deref())
                            .is_some_and(|preferred| preferred.trim() == language)
                    })
                    .take(room),
            );
            if fetched < page_size {
                break;
            }
            offset += fetched;
        }
        debug!(%language, candidates = candidates.len(), "plan_language: candidates selected");

        let plan = plan_single(candidates.len(), &agent_ids, limit);
        Ok((candidates, plan))
    }

    async fn plan_all_languages(
        &self,
        request: &AllocationRequest,
        scope: Option<&str>,
        limit: usize,
    ) -> TaskResult<(Vec<Task>, Plan)> {
        debug!(limit, "plan_all_languages: called");
        let agents = self.registry.active_agents(scope).await?;
        if agents.is_empty() {
            return Err(TaskError::NoCapableAgents("all".to_string()));
        }
        let buckets = agent_buckets(&agents);

        let candidates = self
            .state
            .list_tasks(unassigned_query(request).window(self.candidate_cap, 0))
            .await?;
        let farmers = self.state.farmers_for(&candidates).await?;
        let languages: Vec<String> = candidates
            .iter()
            .map(|task| {
                language_key(
                    farmers
                        .get(&task.farmer_id)
                        .and_then(|f| f.preferred_language.as_deref()),
                )
            })
            .collect();
        debug!(candidates = candidates.len(), buckets = buckets.len(), "plan_all_languages: candidates selected");

        let plan = plan_all(&languages, &buckets, limit);
        Ok((candidates, plan))
    }
}

/// Unassigned tasks in the request window; windowed reads come back earliest due first
fn unassigned_query(request: &AllocationRequest) -> TaskQuery {
    TaskQuery::with_status(TaskStatus::Unassigned).between(request.date_from, request.date_to)
}
