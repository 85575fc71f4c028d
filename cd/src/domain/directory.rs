//! Farmer and Activity directories, and the task read model
//!
//! Directory records arrive loosely populated. Every optional field is
//! resolved exactly once, here, into a summary with an "Unknown" fallback.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use taskstore::{IndexValue, Record};

use super::date::format_date;
use super::task::Task;

/// Fallback for any missing directory field
pub const UNKNOWN: &str = "Unknown";

fn or_unknown(value: Option<&String>) -> String {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// A farmer targeted for outreach
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Farmer {
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
    #[serde(default)]
    pub updated_at: i64,
}

impl Farmer {
    pub fn new(id: impl Into<String>, preferred_language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            preferred_language: Some(preferred_language.into()),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Record for Farmer {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "farmers"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        if let Some(ref language) = self.preferred_language {
            fields.insert("preferred_language".to_string(), IndexValue::String(language.clone()));
        }
        fields
    }
}

/// A field event (demo, meeting, training) that produced outreach tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    #[serde(default)]
    pub kind: Option<String>,
    /// Event date (Unix milliseconds)
    #[serde(default)]
    pub date: Option<i64>,
    #[serde(default)]
    pub officer_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub crops: Vec<String>,
    #[serde(default)]
    pub updated_at: i64,
}

impl Activity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

impl Record for Activity {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "activities"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        HashMap::new()
    }
}

/// Farmer fields as shown alongside a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FarmerSummary {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub preferred_language: String,
    pub location: String,
}

impl FarmerSummary {
    pub fn resolve(id: &str, farmer: Option<&Farmer>) -> Self {
        let location = farmer
            .map(|f| {
                [f.village.as_ref(), f.district.as_ref()]
                    .into_iter()
                    .flatten()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());
        Self {
            id: id.to_string(),
            name: or_unknown(farmer.and_then(|f| f.name.as_ref())),
            phone: or_unknown(farmer.and_then(|f| f.phone.as_ref())),
            preferred_language: or_unknown(farmer.and_then(|f| f.preferred_language.as_ref())),
            location,
        }
    }
}

/// Activity fields as shown alongside a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivitySummary {
    pub id: String,
    pub kind: String,
    pub date: String,
    pub officer_name: String,
    pub location: String,
    pub crops: Vec<String>,
}

impl ActivitySummary {
    pub fn resolve(id: &str, activity: Option<&Activity>) -> Self {
        Self {
            id: id.to_string(),
            kind: or_unknown(activity.and_then(|a| a.kind.as_ref())),
            date: activity
                .and_then(|a| a.date)
                .map(format_date)
                .unwrap_or_else(|| UNKNOWN.to_string()),
            officer_name: or_unknown(activity.and_then(|a| a.officer_name.as_ref())),
            location: or_unknown(activity.and_then(|a| a.location.as_ref())),
            crops: activity.map(|a| a.crops.clone()).unwrap_or_default(),
        }
    }
}

/// A task with its farmer and activity resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub farmer: FarmerSummary,
    pub activity: ActivitySummary,
}

impl TaskView {
    pub fn resolve(task: Task, farmers: &HashMap<String, Farmer>, activities: &HashMap<String, Activity>) -> Self {
        let farmer = FarmerSummary::resolve(&task.farmer_id, farmers.get(&task.farmer_id));
        let activity = ActivitySummary::resolve(&task.activity_id, activities.get(&task.activity_id));
        Self { task, farmer, activity }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_farmer_summary_fallbacks() {
        let summary = FarmerSummary::resolve("f1", None);
        assert_eq!(summary.name, UNKNOWN);
        assert_eq!(summary.preferred_language, UNKNOWN);
        assert_eq!(summary.location, UNKNOWN);

        let farmer = Farmer {
            id: "f1".into(),
            name: Some("  ".into()),
            village: Some("Rampur".into()),
            ..Farmer::new("f1", "Hindi")
        };
        let summary = FarmerSummary::resolve("f1", Some(&farmer));
        assert_eq!(summary.name, UNKNOWN);
        assert_eq!(summary.preferred_language, "Hindi");
        assert_eq!(summary.location, "Rampur");
    }

    #[test]
    fn test_activity_summary() {
        let activity = Activity {
            kind: Some("Field Day".into()),
            date: Some(1_714_521_600_000),
            crops: vec!["Paddy".into()],
            ..Activity::new("a1")
        };
        let summary = ActivitySummary::resolve("a1", Some(&activity));
        assert_eq!(summary.kind, "Field Day");
        assert_eq!(summary.date, "2024-05-01");
        assert_eq!(summary.officer_name, UNKNOWN);
        assert_eq!(summary.crops, vec!["Paddy".to_string()]);
    }

    #[test]
    fn test_task_view_resolve() {
        let task = Task::with_id("t1", "f1", "missing", 0);
        let mut farmers = HashMap::new();
        farmers.insert("f1".to_string(), Farmer::new("f1", "Telugu").with_name("Ravi"));
        let view = TaskView::resolve(task, &farmers, &HashMap::new());
        assert_eq!(view.farmer.name, "Ravi");
        assert_eq!(view.activity.kind, UNKNOWN);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], "t1");
        assert_eq!(json["farmer"]["preferred_language"], "Telugu");
    }
}
