//! Agent domain type
//!
//! Agents are owned by external user management; CallDesk only reads them to
//! resolve language capability and supervision.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use taskstore::{IndexValue, Record, now_ms};

use super::language::language_key;
use crate::error::TaskError;

/// Role of a user in the call center
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Call-center agent working a queue
    #[default]
    Agent,
    /// Supervisor of a team of agents
    TeamLead,
    /// Unscoped administrator
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agent => write!(f, "agent"),
            Self::TeamLead => write!(f, "team_lead"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "agent" => Ok(Self::Agent),
            "team_lead" => Ok(Self::TeamLead),
            "admin" => Ok(Self::Admin),
            _ => Err(TaskError::validation(format!("Unknown role: '{}'", s))),
        }
    }
}

/// A call-center user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub role: Role,

    /// Languages the agent can call in (compared case-insensitively)
    #[serde(default)]
    pub languages: Vec<String>,

    #[serde(default = "default_active")]
    pub active: bool,

    /// Supervising team lead
    #[serde(default)]
    pub team_lead: Option<String>,

    #[serde(default)]
    pub updated_at: i64,
}

fn default_active() -> bool {
    true
}

impl Agent {
    /// Create an active call-center agent
    pub fn new(id: impl Into<String>, languages: &[&str]) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            role: Role::Agent,
            languages: languages.iter().map(|l| l.to_string()).collect(),
            active: true,
            team_lead: None,
            updated_at: now_ms(),
        }
    }

    /// Create a supervisor
    pub fn team_lead(id: impl Into<String>) -> Self {
        Self {
            role: Role::TeamLead,
            ..Self::new(id, &[])
        }
    }

    pub fn with_team_lead(mut self, team_lead: impl Into<String>) -> Self {
        self.team_lead = Some(team_lead.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Whether the agent can call in the given language
    pub fn speaks(&self, language: &str) -> bool {
        let wanted = language_key(Some(language));
        self.languages.iter().any(|l| language_key(Some(l)) == wanted)
    }

    /// Distinct normalized language keys, sorted
    pub fn language_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .languages
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| language_key(Some(l)))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    pub fn is_supervised_by(&self, team_lead: &str) -> bool {
        self.team_lead.as_deref() == Some(team_lead)
    }
}

impl Record for Agent {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "agents"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("role".to_string(), IndexValue::String(self.role.to_string()));
        fields.insert("active".to_string(), IndexValue::Bool(self.active));
        if let Some(ref lead) = self.team_lead {
            fields.insert("team_lead".to_string(), IndexValue::String(lead.clone()));
        }
        fields
    }
}
