//! State management with actor pattern
//!
//! StateManager owns the TaskStore and processes messages via channels,
//! providing thread-safe access to persistent state. It is both the Task
//! Store and the Agent Registry round trip for every operation.

mod manager;
mod messages;

pub use manager::StateManager;
pub use messages::{AgentQuery, StateCommand, StateError, StateResponse, TaskQuery};
