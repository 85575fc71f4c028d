//! Listing filters and pagination

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{Farmer, Task, TaskStatus, language_key};
use crate::error::{TaskError, TaskResult};

/// Optional narrowing applied to a listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilters {
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Farmer's preferred language, compared case-insensitively
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub date_from: Option<i64>,
    #[serde(default)]
    pub date_to: Option<i64>,
}

impl TaskFilters {
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Whether the task's farmer speaks the filter language (no filter matches all)
    pub(crate) fn matches_language(&self, task: &Task, farmers: &HashMap<String, Farmer>) -> bool {
        match self.language.as_deref() {
            None => true,
            Some(wanted) => {
                let have = farmers
                    .get(&task.farmer_id)
                    .and_then(|f| f.preferred_language.as_deref());
                language_key(have) == language_key(Some(wanted))
            }
        }
    }
}

/// 1-based page number and page size; a zero limit means the default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 0 }
    }
}

impl PageRequest {
    pub fn new(page: usize, limit: usize) -> Self {
        Self { page, limit }
    }

    /// Effective (page, limit), limit clamped to `max_limit`
    pub(crate) fn resolve(&self, default_limit: usize, max_limit: usize) -> TaskResult<(usize, usize)> {
        if self.page == 0 {
            return Err(TaskError::validation("Page numbers start at 1"));
        }
        let limit = match self.limit {
            0 => default_limit,
            n => n,
        };
        Ok((self.page, limit.clamp(1, max_limit.max(1))))
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// Cut one page out of an already sorted list
    pub(crate) fn slice(all: Vec<T>, page: usize, limit: usize) -> Self {
        let total = all.len();
        // A page too far out to address has no items
        let items = match page.saturating_sub(1).checked_mul(limit) {
            Some(skip) => all.into_iter().skip(skip).take(limit).collect(),
            None => Vec::new(),
        };
        Self {
            items,
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        }
    }

    pub(crate) fn with_items<U>(self, items: Vec<U>) -> Page<U> {
        Page {
            items,
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_resolve() {
        assert_eq!(PageRequest::default().resolve(20, 100).unwrap(), (1, 20));
        assert_eq!(PageRequest::new(3, 500).resolve(20, 100).unwrap(), (3, 100));
        assert_eq!(PageRequest::new(2, 5).resolve(20, 100).unwrap(), (2, 5));
        assert!(PageRequest::new(0, 5).resolve(20, 100).is_err());
    }

    #[test]
    fn test_page_slice() {
        let page = Page::slice((1..=45).collect::<Vec<_>>(), 3, 20);
        assert_eq!(page.items, (41..=45).collect::<Vec<_>>());
        assert_eq!(page.total, 45);
        assert_eq!(page.total_pages, 3);

        let past_end = Page::slice(vec![1, 2], 4, 20);
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total_pages, 1);

        let far: Page<u8> = Page::slice(vec![1, 2, 3], usize::MAX, 20);
        assert!(far.items.is_empty());
        assert_eq!(far.total, 3);
        assert_eq!(far.page, usize::MAX);

        let empty: Page<u8> = Page::slice(Vec::new(), 1, 20);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_matches_language() {
        let mut farmers = HashMap::new();
        farmers.insert("f1".to_string(), Farmer::new("f1", "Hindi"));
        let task = Task::with_id("t1", "f1", "a1", 0);
        let orphan = Task::with_id("t2", "f9", "a1", 0);

        assert!(TaskFilters::default().matches_language(&task, &farmers));
        assert!(TaskFilters::default().with_language("HINDI").matches_language(&task, &farmers));
        assert!(!TaskFilters::default().with_language("Telugu").matches_language(&task, &farmers));
        assert!(TaskFilters::default().with_language("unknown").matches_language(&orphan, &farmers));
    }
}
