//! Agent capability registry
//!
//! Read-only view over agent records: who is active, who supervises whom,
//! and which languages each agent can call in. Every lookup is a single
//! round trip to the state actor.

use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::{Agent, Role};
use crate::error::{TaskError, TaskResult};
use crate::state::{AgentQuery, StateManager};

/// Language key -> ids of agents able to call in it, each list sorted
pub type AgentBuckets = BTreeMap<String, Vec<String>>;

/// Agent lookups for allocation, scoping, and queue resolution
#[derive(Clone)]
pub struct CapabilityRegistry {
    state: StateManager,
}

impl CapabilityRegistry {
    pub fn new(state: StateManager) -> Self {
        Self { state }
    }

    /// Fetch an agent record, failing with NotFound
    pub async fn get_agent(&self, id: &str) -> TaskResult<Agent> {
        debug!(%id, "get_agent: called");
        self.state
            .get_agent(id)
            .await?
            .ok_or_else(|| TaskError::not_found("Agent", id))
    }

    /// Active call-center agents, optionally limited to one team lead's team
    pub async fn active_agents(&self, scope: Option<&str>) -> TaskResult<Vec<Agent>> {
        debug!(?scope, "active_agents: called");
        let agents = self
            .state
            .list_agents(AgentQuery {
                role: Some(Role::Agent),
                active: Some(true),
                team_lead: scope.map(str::to_string),
            })
            .await?;
        debug!(count = agents.len(), "active_agents: resolved");
        Ok(agents)
    }

    /// Active agents in scope that can call in `language`, ordered by id
    pub async fn capable_agents(&self, language: &str, scope: Option<&str>) -> TaskResult<Vec<Agent>> {
        debug!(%language, ?scope, "capable_agents: called");
        let agents: Vec<Agent> = self
            .active_agents(scope)
            .await?
            .into_iter()
            .filter(|agent| agent.speaks(language))
            .collect();
        debug!(%language, count = agents.len(), "capable_agents: resolved");
        Ok(agents)
    }

    /// Every agent supervised by `team_lead`, active or not
    pub async fn team_members(&self, team_lead: &str) -> TaskResult<Vec<Agent>> {
        debug!(%team_lead, "team_members: called");
        Ok(self
            .state
            .list_agents(AgentQuery {
                role: Some(Role::Agent),
                team_lead: Some(team_lead.to_string()),
                ..Default::default()
            })
            .await?)
    }
}

/// Group agents by every language they speak; an agent may sit in several buckets
pub fn agent_buckets(agents: &[Agent]) -> AgentBuckets {
    let mut buckets = AgentBuckets::new();
    for agent in agents {
        for key in agent.language_keys() {
            buckets.entry(key).or_default().push(agent.id.clone());
        }
    }
    for ids in buckets.values_mut() {
        ids.sort();
        ids.dedup();
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn registry() -> CapabilityRegistry {
        let state = StateManager::spawn_in_memory().unwrap();
        state.upsert_agent(Agent::team_lead("tl1")).await.unwrap();
        for agent in [
            Agent::new("a1", &["Hindi", "Marathi"]).with_team_lead("tl1"),
            Agent::new("a2", &["hindi"]).with_team_lead("tl1"),
            Agent::new("a3", &["Hindi"]).with_team_lead("tl1").inactive(),
            Agent::new("a4", &["Telugu"]).with_team_lead("tl2"),
        ] {
            state.upsert_agent(agent).await.unwrap();
        }
        CapabilityRegistry::new(state)
    }

    #[tokio::test]
    async fn test_capable_agents_scoped() {
        let registry = registry().await;
        let ids: Vec<String> = registry
            .capable_agents("HINDI", Some("tl1"))
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["a1", "a2"]);

        assert!(registry.capable_agents("Telugu", Some("tl1")).await.unwrap().is_empty());
        assert_eq!(registry.capable_agents("Telugu", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_team_members_include_inactive() {
        let registry = registry().await;
        let members = registry.team_members("tl1").await.unwrap();
        assert_eq!(members.len(), 3);
        assert_eq!(registry.active_agents(Some("tl1")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_agent_not_found() {
        let registry = registry().await;
        assert_eq!(registry.get_agent("a1").await.unwrap().languages.len(), 2);
        assert_eq!(registry.get_agent("ghost").await.unwrap_err().code(), "not_found");
    }

    #[test]
    fn test_agent_buckets() {
        let agents = vec![
            Agent::new("b", &["Hindi", "Marathi"]),
            Agent::new("a", &["hindi"]),
            Agent::new("c", &[]),
        ];
        let buckets = agent_buckets(&agents);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets["hindi"], vec!["a", "b"]);
        assert_eq!(buckets["marathi"], vec!["b"]);
    }
}
