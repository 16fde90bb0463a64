use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use tracing::warn;

use crate::error::SQLError;
use crate::traits::{Row, SQLExec, SQLStore, SQLTx, Value};

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
///
/// Foreign keys are enforced on every connection; constraint failures are
/// reported as [`SQLError::Constraint`] / [`SQLError::ForeignKey`].
///
/// Every connection also gets `casefold(text)`, a Unicode-aware lowercase.
/// SQLite's own `lower()` only folds ASCII, so case-insensitive indexes and
/// searches should use `casefold` on both sides.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        let conn = Connection::open(path)
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        // Enable WAL mode for better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        Self::configure(conn)
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self, SQLError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        conn.create_scalar_function(
            "casefold",
            1,
            FunctionFlags::SQLITE_UTF8
                | FunctionFlags::SQLITE_DETERMINISTIC
                | FunctionFlags::SQLITE_INNOCUOUS,
            |ctx| {
                Ok(match ctx.get_raw(0) {
                    ValueRef::Null => None,
                    ValueRef::Text(t) => Some(String::from_utf8_lossy(t).to_lowercase()),
                    ValueRef::Integer(i) => Some(i.to_string()),
                    ValueRef::Real(f) => Some(f.to_string()),
                    ValueRef::Blob(b) => Some(String::from_utf8_lossy(b).to_lowercase()),
                })
            },
        )
        .map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SQLError> {
        self.conn
            .lock()
            .map_err(|e| SQLError::Connection(e.to_string()))
    }
}

impl SQLExec for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self.lock()?;
        query_on(&conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self.lock()?;
        exec_on(&conn, sql, params)
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64, SQLError> {
        let conn = self.lock()?;
        insert_on(&conn, sql, params)
    }
}

impl SQLStore for SqliteStore {
    fn exec_batch(&self, sql: &str) -> Result<(), SQLError> {
        self.lock()?
            .execute_batch(sql)
            .map_err(|e| classify(e, SQLError::Execution))
    }

    fn begin(&self) -> Result<Box<dyn SQLTx + '_>, SQLError> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN IMMEDIATE;")
            .map_err(|e| classify(e, SQLError::Execution))?;
        Ok(Box::new(SqliteTx {
            conn,
            finished: false,
        }))
    }
}

/// A transaction holding the connection lock until commit or drop.
struct SqliteTx<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl SQLExec for SqliteTx<'_> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        query_on(&self.conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        exec_on(&self.conn, sql, params)
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64, SQLError> {
        insert_on(&self.conn, sql, params)
    }
}

impl SQLTx for SqliteTx<'_> {
    fn commit(mut self: Box<Self>) -> Result<(), SQLError> {
        self.conn
            .execute_batch("COMMIT;")
            .map_err(|e| classify(e, SQLError::Execution))?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK;") {
                warn!("rollback failed: {e}");
            }
        }
    }
}

/// Convert our Value enum to rusqlite's ToSql.
fn bind_params(params: &[Value]) -> Vec<Box<dyn rusqlite::types::ToSql + '_>> {
    params
        .iter()
        .map(|v| -> Box<dyn rusqlite::types::ToSql + '_> {
            match v {
                Value::Null => Box::new(rusqlite::types::Null),
                Value::Integer(i) => Box::new(*i),
                Value::Real(f) => Box::new(*f),
                Value::Text(s) => Box::new(s.as_str()),
                Value::Blob(b) => Box::new(b.as_slice()),
            }
        })
        .collect()
}

fn query_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| SQLError::Query(e.to_string()))?;

    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let columns = column_names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), row_value_at(row, i)))
                .collect();
            Ok(Row { columns })
        })
        .map_err(|e| SQLError::Query(e.to_string()))?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(|e| SQLError::Query(e.to_string()))?);
    }
    Ok(result)
}

fn exec_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let affected = conn
        .execute(sql, param_refs.as_slice())
        .map_err(|e| classify(e, SQLError::Execution))?;

    Ok(affected as u64)
}

fn insert_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<i64, SQLError> {
    exec_on(conn, sql, params)?;
    Ok(conn.last_insert_rowid())
}

/// Map constraint failures to dedicated variants, everything else via `fallback`.
fn classify(err: rusqlite::Error, fallback: fn(String) -> SQLError) -> SQLError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
        match failure.extended_code {
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                return SQLError::Constraint(err.to_string());
            }
            rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                return SQLError::ForeignKey(err.to_string());
            }
            // RESTRICT actions are raised by SQLite's internal FK trigger.
            rusqlite::ffi::SQLITE_CONSTRAINT_TRIGGER
                if err.to_string().contains("FOREIGN KEY constraint failed") =>
            {
                return SQLError::ForeignKey(err.to_string());
            }
            _ => {}
        }
    }
    fallback(err.to_string())
}

/// Extract a Value from a rusqlite row at a given column index.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> Value {
    match row.get_ref(idx) {
        Ok(ValueRef::Integer(i)) => Value::Integer(i),
        Ok(ValueRef::Real(f)) => Value::Real(f),
        Ok(ValueRef::Text(t)) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        Ok(ValueRef::Blob(b)) => Value::Blob(b.to_vec()),
        Ok(ValueRef::Null) | Err(_) => Value::Null,
    }
}
