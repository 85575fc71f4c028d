//! Allocation request parsing

use serde::{Deserialize, Serialize};

use crate::domain::language_key;
use crate::error::{TaskError, TaskResult};

/// Which language pool an allocation draws from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageSelector {
    /// Every language, balanced across buckets
    All,
    /// One language, matched exactly against the farmer's preference
    Specific(String),
}

impl LanguageSelector {
    /// Parse a raw selector; any of `all_tokens` (case-insensitive) means All
    pub fn parse(raw: &str, all_tokens: &[String]) -> TaskResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TaskError::validation("Allocation language is required"));
        }
        if all_tokens.iter().any(|t| t.trim().eq_ignore_ascii_case(trimmed)) {
            Ok(Self::All)
        } else {
            Ok(Self::Specific(trimmed.to_string()))
        }
    }

    /// Normalized label for logs and history notes
    pub fn label(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Specific(language) => language_key(Some(language)),
        }
    }
}

/// Ask to distribute unassigned tasks to capable agents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRequest {
    /// Language or an "all" token
    pub language: String,
    /// Maximum tasks to allocate; None or 0 means up to the candidate cap
    #[serde(default)]
    pub count: Option<usize>,
    /// Inclusive lower bound on scheduled_date (Unix milliseconds)
    #[serde(default)]
    pub date_from: Option<i64>,
    /// Inclusive upper bound on scheduled_date (Unix milliseconds)
    #[serde(default)]
    pub date_to: Option<i64>,
}

impl AllocationRequest {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Default::default()
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn between(mut self, date_from: Option<i64>, date_to: Option<i64>) -> Self {
        self.date_from = date_from;
        self.date_to = date_to;
        self
    }

    /// Effective task limit: the requested count bounded by the cap
    pub fn limit(&self, cap: usize) -> usize {
        match self.count {
            Some(n) if n > 0 => n.min(cap),
            _ => cap,
        }
    }

    pub fn validate(&self) -> TaskResult<()> {
        match (self.date_from, self.date_to) {
            (Some(from), Some(to)) if from > to => {
                Err(TaskError::validation("Allocation date window ends before it starts"))
            }
            _ => Ok(()),
        }
    }
}
