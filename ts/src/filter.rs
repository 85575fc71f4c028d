//! Index values and filters

use rusqlite::types::Value;

/// Value stored in an index row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl IndexValue {
    /// Column holding this kind of value
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::String(_) => "value_str",
            Self::Int(_) | Self::Bool(_) => "value_int",
        }
    }

    pub(crate) fn to_sql_value(&self) -> Value {
        match self {
            Self::String(s) => Value::Text(s.clone()),
            Self::Int(i) => Value::Integer(*i),
            Self::Bool(b) => Value::Integer(i64::from(*b)),
        }
    }

    /// (value_str, value_int) pair for inserting an index row
    pub(crate) fn split(&self) -> (Option<String>, Option<i64>) {
        match self {
            Self::String(s) => (Some(s.clone()), None),
            Self::Int(i) => (None, Some(*i)),
            Self::Bool(b) => (None, Some(i64::from(*b))),
        }
    }
}

impl From<&str> for IndexValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for IndexValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for IndexValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    fn sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

/// A condition on one indexed field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: IndexValue,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<IndexValue>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Shorthand for an equality filter
    pub fn eq(field: impl Into<String>, value: impl Into<IndexValue>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    /// Render as an EXISTS clause against `record_indexes`, correlated with the
    /// records table named `owner`. Pushes the bound parameters in order.
    pub(crate) fn to_sql(&self, owner: &str, params: &mut Vec<Value>) -> String {
        params.push(Value::Text(self.field.clone()));
        params.push(self.value.to_sql_value());
        format!(
            "EXISTS (SELECT 1 FROM record_indexes i WHERE i.collection = {owner}.collection \
             AND i.id = {owner}.id AND i.field = ? AND i.{} {} ?)",
            self.value.column(),
            self.op.sql()
        )
    }
}
