//! Fixture loading from YAML
//!
//! A seed file populates the registry, both directories, and the pool of
//! unassigned tasks in one go:
//!
//! ```yaml
//! agents:
//!   - id: agent-1
//!     languages: [Hindi]
//!     team-lead: tl1
//! farmers:
//!   - id: f1
//!     preferred-language: Hindi
//! activities:
//!   - id: act-1
//!     date: 2024-05-01
//! tasks:
//!   - farmer: f1
//!     activity: act-1
//!     scheduled: 2024-05-03
//! ```

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::domain::{Activity, Agent, Farmer, Role, Task, day_start_ms};
use crate::error::TaskResult;
use crate::service::TaskService;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SeedFile {
    pub agents: Vec<SeedAgent>,
    pub farmers: Vec<SeedFarmer>,
    pub activities: Vec<SeedActivity>,
    pub tasks: Vec<SeedTask>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SeedAgent {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub team_lead: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SeedFarmer {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub preferred_language: Option<String>,
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SeedActivity {
    pub id: String,
    #[serde(default)]
    pub kind: Option<String>,
    /// YYYY-MM-DD
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub officer_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub crops: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SeedTask {
    /// Generated when omitted
    #[serde(default)]
    pub id: Option<String>,
    pub farmer: String,
    pub activity: String,
    /// YYYY-MM-DD
    pub scheduled: String,
    #[serde(default)]
    pub parent_task: Option<String>,
    #[serde(default)]
    pub callback_number: Option<u32>,
}

/// What a seed run stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub agents: usize,
    pub farmers: usize,
    pub activities: usize,
    pub tasks: Vec<String>,
}

impl SeedFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "SeedFile::load: called");
        let content = fs::read_to_string(path).context(format!("Failed to read seed file {}", path.display()))?;
        serde_yaml::from_str(&content).context("Failed to parse seed file")
    }

    /// Store everything through the service; tasks land unassigned
    pub async fn apply(self, service: &TaskService) -> TaskResult<SeedSummary> {
        debug!(
            agents = self.agents.len(),
            farmers = self.farmers.len(),
            activities = self.activities.len(),
            tasks = self.tasks.len(),
            "SeedFile::apply: called"
        );
        let mut summary = SeedSummary::default();

        for seed in self.agents {
            let mut agent = Agent::new(seed.id, &[]).with_name(seed.name);
            agent.role = seed.role;
            agent.languages = seed.languages;
            agent.active = seed.active;
            agent.team_lead = seed.team_lead;
            service.register_agent(agent).await?;
            summary.agents += 1;
        }

        for seed in self.farmers {
            service
                .register_farmer(Farmer {
                    id: seed.id,
                    name: seed.name,
                    phone: seed.phone,
                    preferred_language: seed.preferred_language,
                    village: seed.village,
                    district: seed.district,
                    updated_at: taskstore::now_ms(),
                })
                .await?;
            summary.farmers += 1;
        }

        for seed in self.activities {
            let date = seed.date.as_deref().map(day_start_ms).transpose()?;
            service
                .register_activity(Activity {
                    id: seed.id,
                    kind: seed.kind,
                    date,
                    officer_name: seed.officer_name,
                    location: seed.location,
                    crops: seed.crops,
                    updated_at: taskstore::now_ms(),
                })
                .await?;
            summary.activities += 1;
        }

        for seed in self.tasks {
            let scheduled = day_start_ms(&seed.scheduled)?;
            let mut task = match seed.id {
                Some(id) => Task::with_id(id, seed.farmer, seed.activity, scheduled),
                None => Task::new_unassigned(seed.farmer, seed.activity, scheduled),
            };
            if let Some(parent) = seed.parent_task {
                task = task.with_callback(parent, seed.callback_number.unwrap_or(1));
            }
            summary.tasks.push(service.create_task(task).await?);
        }

        info!(
            agents = summary.agents,
            farmers = summary.farmers,
            activities = summary.activities,
            tasks = summary.tasks.len(),
            "Seed applied"
        );
        Ok(summary)
    }
}
