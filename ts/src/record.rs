//! The Record trait implemented by every persisted type

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

use crate::filter::IndexValue;

/// A document that can be persisted in the store
///
/// `indexed_fields` is recomputed on every write, so a field that is absent
/// from the map (e.g. an unset optional reference) simply has no index row and
/// never matches a filter on that field.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + 'static {
    /// Unique identifier within the collection
    fn id(&self) -> &str;

    /// Last update timestamp (Unix milliseconds)
    fn updated_at(&self) -> i64;

    /// Collection (table partition) name
    fn collection_name() -> &'static str;

    /// Fields exposed for filtering and guarded writes
    fn indexed_fields(&self) -> HashMap<String, IndexValue>;
}
