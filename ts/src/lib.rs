//! TaskStore - generic persistent record store
//!
//! Records are JSON documents keyed by `(collection, id)` in SQLite, with a
//! side table of indexed fields used for filtering and for guarded writes.
//!
//! # Architecture
//!
//! ```text
//! {store_path}/
//! └── taskstore.db
//!     ├── records          (collection, id, data, updated_at)
//!     └── record_indexes   (collection, id, field, value_str, value_int)
//! ```
//!
//! # Guarded writes
//!
//! `update_if` and `update_many_if` only replace a row when its *stored*
//! indexed field still satisfies the guard filter. A guard miss modifies
//! nothing and is reported through the return value, not as an error.
//!
//! # Example
//!
//! ```ignore
//! use taskstore::{Filter, Store};
//!
//! let mut store = Store::open(".taskstore")?;
//! store.create(task.clone())?;
//! let claimed = store.update_if(assigned, &Filter::eq("status", "unassigned"))?;
//! ```

mod filter;
mod record;
mod store;

pub use filter::{Filter, FilterOp, IndexValue};
pub use record::Record;
pub use store::Store;

/// Database file name inside the store directory
pub const DB_FILE_NAME: &str = "taskstore.db";

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
