//! Core Store implementation

use eyre::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params, params_from_iter};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::filter::Filter;
use crate::record::Record;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (collection, id)
);
CREATE TABLE IF NOT EXISTS record_indexes (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    field TEXT NOT NULL,
    value_str TEXT,
    value_int INTEGER
);
CREATE INDEX IF NOT EXISTS idx_record_indexes_lookup
    ON record_indexes (collection, field, value_str, value_int);
CREATE INDEX IF NOT EXISTS idx_record_indexes_owner
    ON record_indexes (collection, id);
";

/// SQLite-backed record store
pub struct Store {
    conn: Connection,
    /// Directory holding the database (None for in-memory stores)
    base_path: Option<PathBuf>,
}

impl Store {
    /// Open or create a store in the given directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create store directory")?;
        let db_path = base_path.join(crate::DB_FILE_NAME);
        let conn = Connection::open(&db_path).context(format!("Failed to open database: {}", db_path.display()))?;
        let _mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .context("Failed to enable WAL journal")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA).context("Failed to initialize schema")?;
        debug!(?base_path, "Opened task store");
        Ok(Self {
            conn,
            base_path: Some(base_path),
        })
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA).context("Failed to initialize schema")?;
        Ok(Self { conn, base_path: None })
    }

    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    /// Insert a new record; fails if the id is already taken
    pub fn create<R: Record>(&mut self, record: R) -> Result<String> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if exists::<R>(&tx, record.id())? {
            return Err(eyre::eyre!(
                "Record already exists: {}/{}",
                R::collection_name(),
                record.id()
            ));
        }
        write_record(&tx, &record)?;
        tx.commit()?;
        debug!(collection = R::collection_name(), id = record.id(), "Created record");
        Ok(record.id().to_string())
    }

    /// Insert or replace a record
    pub fn upsert<R: Record>(&mut self, record: R) -> Result<()> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        write_record(&tx, &record)?;
        tx.commit()?;
        Ok(())
    }

    /// Replace an existing record; fails if it does not exist
    pub fn update<R: Record>(&mut self, record: R) -> Result<()> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !exists::<R>(&tx, record.id())? {
            return Err(eyre::eyre!("Record not found: {}/{}", R::collection_name(), record.id()));
        }
        write_record(&tx, &record)?;
        tx.commit()?;
        Ok(())
    }

    /// Replace a record only if its stored index matches `guard`
    ///
    /// Returns false when the guard did not match (or the row is missing).
    pub fn update_if<R: Record>(&mut self, record: R, guard: &Filter) -> Result<bool> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let modified = guarded_write(&tx, &record, guard)?;
        tx.commit()?;
        Ok(modified)
    }

    /// Apply independent guarded writes in one transaction
    ///
    /// Each item succeeds or misses on its own; the return value is the exact
    /// number of rows modified.
    pub fn update_many_if<R: Record>(&mut self, items: Vec<(R, Filter)>) -> Result<usize> {
        let total = items.len();
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut modified = 0;
        for (record, guard) in &items {
            if guarded_write(&tx, record, guard)? {
                modified += 1;
            }
        }
        tx.commit()?;
        info!(
            collection = R::collection_name(),
            total, modified, "Applied guarded batch write"
        );
        Ok(modified)
    }

    /// Fetch one record by id
    pub fn get<R: Record>(&self, id: &str) -> Result<Option<R>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM records WHERE collection = ?1 AND id = ?2",
                params![R::collection_name(), id],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|d| decode::<R>(&d)).transpose()
    }

    /// Fetch the records among `ids` that exist (order by id)
    pub fn get_many<R: Record>(&self, ids: &[String]) -> Result<Vec<R>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT data FROM records WHERE collection = ? AND id IN ({placeholders}) ORDER BY id");
        let mut params = vec![Value::Text(R::collection_name().to_string())];
        params.extend(ids.iter().map(|id| Value::Text(id.clone())));
        self.query_records(&sql, params)
    }

    /// List records matching every filter (order by id)
    pub fn list<R: Record>(&self, filters: &[Filter]) -> Result<Vec<R>> {
        let (where_sql, params) = where_clause::<R>(filters);
        let sql = format!("SELECT r.data FROM records r WHERE {where_sql} ORDER BY r.id");
        self.query_records(&sql, params)
    }

    /// List one window of records matching every filter
    ///
    /// Rows are ordered by the indexed fields in `order_by` (ascending, missing
    /// index rows first), then by id. `offset` rows are skipped and at most
    /// `limit` returned, so the read stays bounded however large the
    /// collection grows.
    pub fn list_page<R: Record>(
        &self,
        filters: &[Filter],
        order_by: &[&str],
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<R>> {
        let mut params = Vec::new();
        let mut joins = String::new();
        let mut order = Vec::new();
        for (n, field) in order_by.iter().enumerate() {
            joins.push_str(&format!(
                " LEFT JOIN record_indexes o{n} ON o{n}.collection = r.collection AND o{n}.id = r.id AND o{n}.field = ?"
            ));
            params.push(Value::Text(field.to_string()));
            order.push(format!("o{n}.value_int, o{n}.value_str"));
        }
        order.push("r.id".to_string());

        let (where_sql, where_params) = where_clause::<R>(filters);
        params.extend(where_params);
        let mut sql = format!(
            "SELECT r.data FROM records r{joins} WHERE {where_sql} ORDER BY {}",
            order.join(", ")
        );
        if limit.is_some() || offset > 0 {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(Value::Integer(limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX))));
            params.push(Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));
        }
        debug!(collection = R::collection_name(), ?order_by, ?limit, offset, "list_page: called");
        self.query_records(&sql, params)
    }

    /// Count records matching every filter
    pub fn count<R: Record>(&self, filters: &[Filter]) -> Result<usize> {
        let (where_sql, params) = where_clause::<R>(filters);
        let sql = format!("SELECT COUNT(*) FROM records r WHERE {where_sql}");
        let count: i64 = self.conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Recompute index rows for every record of a type
    pub fn rebuild_indexes<R: Record>(&mut self) -> Result<usize> {
        let records: Vec<R> = self.list(&[])?;
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for record in &records {
            write_indexes(&tx, record)?;
        }
        tx.commit()?;
        debug!(collection = R::collection_name(), count = records.len(), "Rebuilt indexes");
        Ok(records.len())
    }

    fn query_records<R: Record>(&self, sql: &str, params: Vec<Value>) -> Result<Vec<R>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(0))?;
        let mut records = Vec::new();
        for data in rows {
            records.push(decode::<R>(&data?)?);
        }
        Ok(records)
    }
}

fn decode<R: Record>(data: &str) -> Result<R> {
    serde_json::from_str(data).context(format!("Failed to decode {} record", R::collection_name()))
}

fn where_clause<R: Record>(filters: &[Filter]) -> (String, Vec<Value>) {
    let mut params = vec![Value::Text(R::collection_name().to_string())];
    let mut clauses = vec!["r.collection = ?".to_string()];
    for filter in filters {
        clauses.push(filter.to_sql("r", &mut params));
    }
    (clauses.join(" AND "), params)
}

fn exists<R: Record>(tx: &Transaction<'_>, id: &str) -> Result<bool> {
    let found: Option<i64> = tx
        .query_row(
            "SELECT 1 FROM records WHERE collection = ?1 AND id = ?2",
            params![R::collection_name(), id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn write_record<R: Record>(tx: &Transaction<'_>, record: &R) -> Result<()> {
    let data = serde_json::to_string(record)?;
    tx.execute(
        "INSERT INTO records (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        params![R::collection_name(), record.id(), data, record.updated_at()],
    )?;
    write_indexes(tx, record)
}

fn guarded_write<R: Record>(tx: &Transaction<'_>, record: &R, guard: &Filter) -> Result<bool> {
    let data = serde_json::to_string(record)?;
    let mut params = vec![
        Value::Text(data),
        Value::Integer(record.updated_at()),
        Value::Text(R::collection_name().to_string()),
        Value::Text(record.id().to_string()),
    ];
    let guard_sql = guard.to_sql("records", &mut params);
    let sql = format!(
        "UPDATE records SET data = ?, updated_at = ? WHERE collection = ? AND id = ? AND {guard_sql}"
    );
    let changed = tx.execute(&sql, params_from_iter(params.iter()))?;
    if changed == 0 {
        debug!(
            collection = R::collection_name(),
            id = record.id(),
            field = %guard.field,
            "Guarded write missed"
        );
        return Ok(false);
    }
    write_indexes(tx, record)?;
    Ok(true)
}

fn write_indexes<R: Record>(tx: &Transaction<'_>, record: &R) -> Result<()> {
    tx.execute(
        "DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2",
        params![R::collection_name(), record.id()],
    )?;
    let mut stmt = tx.prepare_cached(
        "INSERT INTO record_indexes (collection, id, field, value_str, value_int) VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (field, value) in record.indexed_fields() {
        let (value_str, value_int) = value.split();
        stmt.execute(params![R::collection_name(), record.id(), field, value_str, value_int])?;
    }
    Ok(())
}
