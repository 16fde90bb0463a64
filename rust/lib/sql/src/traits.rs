use crate::error::SQLError;

/// A dynamically-typed SQL parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// `Text` for `Some`, `Null` for `None`.
    pub fn opt_text(v: Option<&str>) -> Self {
        v.map_or(Value::Null, |s| Value::Text(s.to_string()))
    }

    /// `Integer` for `Some`, `Null` for `None`.
    pub fn opt_int(v: Option<i64>) -> Self {
        v.map_or(Value::Null, Value::Integer)
    }

    /// Booleans are stored as 0/1 integers.
    pub fn opt_bool(v: Option<bool>) -> Self {
        v.map_or(Value::Null, |b| Value::Integer(i64::from(b)))
    }
}

/// A row returned from a SQL query: column name to value.
#[derive(Debug, Clone)]
pub struct Row {
    pub columns: Vec<(String, Value)>,
}

impl Row {
    /// Get a column value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Get a text column value by name.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(Value::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get an integer column value by name.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(Value::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Get a 0/1 integer column as a boolean.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get_i64(name).map(|i| i != 0)
    }
}

/// Statement execution shared by the store itself and open transactions.
pub trait SQLExec {
    /// Execute a query and return rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError>;

    /// Execute a statement (INSERT/UPDATE/DELETE) and return affected row count.
    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError>;

    /// Execute an INSERT and return the rowid it assigned.
    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64, SQLError>;
}

/// An open transaction. Dropping it without `commit` rolls back.
pub trait SQLTx: SQLExec {
    fn commit(self: Box<Self>) -> Result<(), SQLError>;
}

/// SQLStore provides a SQL execution interface backed by an embedded database.
pub trait SQLStore: SQLExec + Send + Sync {
    /// Run several `;`-separated statements without parameters (schema setup).
    fn exec_batch(&self, sql: &str) -> Result<(), SQLError>;

    /// Start a transaction. The store is exclusively held until it ends.
    fn begin(&self) -> Result<Box<dyn SQLTx + '_>, SQLError>;
}
