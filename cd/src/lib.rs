//! CallDesk - task allocation and lifecycle engine for outbound call queues
//!
//! CallDesk distributes farmer-outreach call tasks to call-center agents and
//! governs each task's lifecycle while agents work their queue.
//!
//! # Core Concepts
//!
//! - **Fair distribution**: round-robin over capable agents, and across language
//!   buckets when allocating for every language at once
//! - **Guarded lifecycle**: every status change goes through a transition that
//!   appends to the task's interaction history
//! - **Conditional writes**: double-assignment is prevented by compare-and-swap
//!   writes in the task store, not by locks
//! - **Best-effort bulk**: batch operations report per-item failures and never
//!   roll back successful items
//!
//! # Modules
//!
//! - [`domain`] - Task, Agent, Farmer and Activity records
//! - [`lifecycle`] - Status transitions and call outcome mapping
//! - [`registry`] - Agent capability lookup
//! - [`allocator`] - Fair distribution of unassigned tasks
//! - [`queue`] - Per-agent work queue resolution
//! - [`bulk`] - Batch mutation with partial-failure reporting
//! - [`service`] - Transport-agnostic operations exposed to callers
//! - [`state`] - Actor owning the TaskStore

pub mod allocator;
pub mod auth;
pub mod bulk;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod queue;
pub mod registry;
pub mod seed;
pub mod service;
pub mod state;

// Re-export commonly used types
pub use allocator::{AllocationRequest, AllocationResult, Allocator, LanguageSelector};
pub use auth::{Caller, Permission, authorize};
pub use bulk::{BatchItem, BatchItemError, BatchResult};
pub use config::Config;
pub use domain::{
    Activity, ActivitySummary, Agent, CallLog, Farmer, FarmerSummary, InteractionEntry, Role, Sentiment, Task,
    TaskStatus, TaskView,
};
pub use error::{TaskError, TaskResult};
pub use lifecycle::{CallOutcome, LoadOutcome};
pub use queue::WorkQueue;
pub use registry::CapabilityRegistry;
pub use service::{Page, PageRequest, TaskFilters, TaskService};
pub use state::{StateCommand, StateError, StateManager, StateResponse, TaskQuery};
