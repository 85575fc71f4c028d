//! Domain types for CallDesk
//!
//! Core records: Task, Agent, Farmer, Activity.
//! All implement the Record trait for TaskStore persistence.
//!
//! Farmer and Activity are read-only directories owned elsewhere; their
//! loosely-populated fields are resolved once into summaries with an
//! "Unknown" fallback when a [`TaskView`] is built.

mod agent;
mod date;
mod directory;
mod id;
mod language;
mod task;

pub use agent::{Agent, Role};
pub use date::{day_end_ms, day_start_ms, format_date};
pub use directory::{Activity, ActivitySummary, Farmer, FarmerSummary, TaskView, UNKNOWN};
pub use id::{generate_id, validate_id};
pub use language::{UNKNOWN_LANGUAGE, language_key};
pub use task::{CallLog, InteractionEntry, Sentiment, Task, TaskStatus};
pub(crate) use task::sort_by_queue_order;

// Re-export taskstore types for convenience
pub use taskstore::{Filter, FilterOp, IndexValue, Record, Store};
