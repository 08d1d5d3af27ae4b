use rusqlite::types::{ToSqlOutput, Value as SqliteValue, ValueRef};
use rusqlite::{params_from_iter, Connection, Statement, ToSql};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use crate::db::connection::{BackendCredentials, SqliteCredentials};
use crate::db::driver::{
    wrong_backend, Driver, DriverConnection, DriverEngine, EngineOptions, Execution,
};
use crate::db::value::{QueryOutput, Row, Value};
use crate::db::Backend;
use crate::error::DriverError;

/// Driver backed by `rusqlite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

fn sqlite_credentials(credentials: &BackendCredentials) -> Result<&SqliteCredentials, DriverError> {
    match credentials {
        BackendCredentials::Sqlite(c) => Ok(c),
        other => Err(wrong_backend(Backend::Sqlite, other)),
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqliteValue::Null),
            Value::Integer(n) => ToSqlOutput::from(*n),
            Value::Float(f) => ToSqlOutput::from(*f),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Timestamp(t) => t.to_sql()?,
            Value::Blob(b) => ToSqlOutput::from(b.as_slice()),
        })
    }
}

fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Integer(n),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(s) => Value::Text(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

impl Driver for SqliteDriver {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn connect(
        &self,
        credentials: &BackendCredentials,
    ) -> Result<Box<dyn DriverConnection>, DriverError> {
        let credentials = sqlite_credentials(credentials)?;
        let conn = Connection::open(credentials.path())?;
        Ok(Box::new(SqliteSession::new(conn)))
    }

    fn create_engine(
        &self,
        credentials: &BackendCredentials,
        _options: &EngineOptions,
    ) -> Result<Box<dyn DriverEngine>, DriverError> {
        let credentials = sqlite_credentials(credentials)?;
        Ok(Box::new(SqliteEngine {
            path: credentials.path(),
            url: credentials.engine_url(),
        }))
    }
}

/// One SQLite connection. Closing it releases the file handle.
pub struct SqliteSession {
    conn: Mutex<Option<Connection>>,
}

impl SqliteSession {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("sqlite connection lock was poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, DriverError> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(DriverError::Closed)?;
        Ok(f(conn)?)
    }
}

fn fetch_rows(stmt: &mut Statement<'_>, params: &[Value]) -> rusqlite::Result<QueryOutput> {
    let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut result = stmt.query(params_from_iter(params.iter()))?;
    while let Some(row) = result.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(value_from_ref(row.get_ref(i)?));
        }
        rows.push(values);
    }

    Ok(QueryOutput { columns, rows })
}

impl DriverConnection for SqliteSession {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DriverError> {
        self.with_conn(|conn| {
            let affected = conn.execute(sql, params_from_iter(params.iter()))?;
            Ok(affected as u64)
        })
    }

    fn execute_many(&self, sql: &str, rows: &[Row]) -> Result<u64, DriverError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let mut affected = 0u64;
            for row in rows {
                affected += stmt.execute(params_from_iter(row.iter()))? as u64;
            }
            Ok(affected)
        })
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryOutput, DriverError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            fetch_rows(&mut stmt, params)
        })
    }

    fn run(&self, sql: &str, params: &[Value]) -> Result<Execution, DriverError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            if stmt.column_count() > 0 {
                fetch_rows(&mut stmt, params).map(Execution::Rows)
            } else {
                let affected = stmt.execute(params_from_iter(params.iter()))?;
                Ok(Execution::Affected(affected as u64))
            }
        })
    }

    fn commit(&self) -> Result<(), DriverError> {
        self.with_conn(|conn| {
            if !conn.is_autocommit() {
                conn.execute_batch("COMMIT")?;
            }
            Ok(())
        })
    }

    fn rollback(&self) -> Result<(), DriverError> {
        self.with_conn(|conn| {
            if !conn.is_autocommit() {
                conn.execute_batch("ROLLBACK")?;
            }
            Ok(())
        })
    }

    fn close(&self) -> Result<(), DriverError> {
        let conn = self.lock().take();
        match conn {
            Some(conn) => conn.close().map_err(|(_, err)| DriverError::Sqlite(err)),
            None => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.lock().is_none()
    }
}

/// SQLite engine: opens a fresh connection to the same file on every checkout.
pub struct SqliteEngine {
    path: PathBuf,
    url: String,
}

impl DriverEngine for SqliteEngine {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn connect(&self) -> Result<Box<dyn DriverConnection>, DriverError> {
        let conn = Connection::open(&self.path)?;
        Ok(Box::new(SqliteSession::new(conn)))
    }
}
