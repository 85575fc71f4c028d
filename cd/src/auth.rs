//! Caller identity and permission checks
//!
//! Kept outside the lifecycle: transitions never look at roles. The service
//! calls [`authorize`] first, then applies supervisor scoping where an
//! operation targets specific agents.

use serde::{Deserialize, Serialize};

use crate::domain::{Agent, Role};
use crate::error::{TaskError, TaskResult};

/// Operations gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    AllocateTasks,
    WorkQueue,
    ReassignTasks,
    OverrideStatus,
    ViewTeamTasks,
    ViewAllTasks,
}

/// The authenticated user making a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn agent(id: impl Into<String>) -> Self {
        Self::new(id, Role::Agent)
    }

    pub fn team_lead(id: impl Into<String>) -> Self {
        Self::new(id, Role::TeamLead)
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, Role::Admin)
    }

    /// Team lead whose agents bound this caller's reach; None for admins
    pub fn supervisor_scope(&self) -> Option<&str> {
        match self.role {
            Role::Admin => None,
            Role::TeamLead | Role::Agent => Some(self.id.as_str()),
        }
    }
}

impl From<&Agent> for Caller {
    fn from(agent: &Agent) -> Self {
        Self::new(agent.id.clone(), agent.role)
    }
}

fn granted(role: Role, permission: Permission) -> bool {
    match role {
        Role::Admin => true,
        Role::TeamLead => permission != Permission::ViewAllTasks,
        Role::Agent => permission == Permission::WorkQueue,
    }
}

/// Fail with `Forbidden` unless the caller's role holds the permission
pub fn authorize(caller: &Caller, permission: Permission) -> TaskResult<()> {
    if granted(caller.role, permission) {
        Ok(())
    } else {
        Err(TaskError::Forbidden(format!(
            "{} {} lacks permission {:?}",
            caller.role, caller.id, permission
        )))
    }
}

/// Fail with `Forbidden` unless the agent falls within the caller's team
pub fn ensure_supervises(caller: &Caller, agent: &Agent) -> TaskResult<()> {
    match caller.supervisor_scope() {
        None => Ok(()),
        Some(lead) if agent.is_supervised_by(lead) => Ok(()),
        Some(lead) => Err(TaskError::Forbidden(format!(
            "Agent {} is not supervised by {}",
            agent.id, lead
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_permissions() {
        let caller = Caller::agent("a1");
        assert!(authorize(&caller, Permission::WorkQueue).is_ok());
        for permission in [
            Permission::AllocateTasks,
            Permission::ReassignTasks,
            Permission::OverrideStatus,
            Permission::ViewTeamTasks,
            Permission::ViewAllTasks,
        ] {
            assert_eq!(authorize(&caller, permission).unwrap_err().code(), "forbidden");
        }
    }

    #[test]
    fn test_team_lead_permissions() {
        let caller = Caller::team_lead("tl1");
        assert!(authorize(&caller, Permission::AllocateTasks).is_ok());
        assert!(authorize(&caller, Permission::OverrideStatus).is_ok());
        assert!(authorize(&caller, Permission::ViewAllTasks).is_err());
    }

    #[test]
    fn test_admin_holds_everything() {
        let caller = Caller::admin("root");
        assert!(authorize(&caller, Permission::ViewAllTasks).is_ok());
        assert!(caller.supervisor_scope().is_none());
    }

    #[test]
    fn test_ensure_supervises() {
        let agent = Agent::new("a1", &["Hindi"]).with_team_lead("tl1");
        assert!(ensure_supervises(&Caller::team_lead("tl1"), &agent).is_ok());
        assert!(ensure_supervises(&Caller::team_lead("tl2"), &agent).is_err());
        assert!(ensure_supervises(&Caller::admin("root"), &agent).is_ok());
    }
}
