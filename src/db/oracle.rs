use chrono::NaiveDateTime;
use once_cell::sync::OnceCell;
use oracle::pool::{Pool, PoolBuilder};
use oracle::sql_type::{OracleType, ToSql};
use oracle::{Connection, Error as OracleError, Row as OracleRow, SqlValue, Statement};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::db::connection::{BackendCredentials, OracleCredentials};
use crate::db::driver::{
    wrong_backend, Driver, DriverConnection, DriverEngine, EngineOptions, Execution,
};
use crate::db::value::{QueryOutput, Row, Value};
use crate::db::Backend;
use crate::error::DriverError;

/// Driver backed by the `oracle` crate (ODPI-C).
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDriver;

fn oracle_credentials(credentials: &BackendCredentials) -> Result<&OracleCredentials, DriverError> {
    match credentials {
        BackendCredentials::Oracle(c) => Ok(c),
        other => Err(wrong_backend(Backend::Oracle, other)),
    }
}

fn apply_default_session_settings(conn: &Connection) {
    let statements = [
        "ALTER SESSION SET NLS_TIMESTAMP_FORMAT = 'yyyy-mm-dd hh24:mi:ss'",
        "ALTER SESSION SET NLS_DATE_FORMAT = 'yyyy-mm-dd hh24:mi:ss'",
    ];

    for statement in statements {
        if let Err(err) = conn.execute(statement, &[]) {
            warn!(%statement, error = %err, "failed to apply default session setting");
        }
    }
}

impl Driver for OracleDriver {
    fn backend(&self) -> Backend {
        Backend::Oracle
    }

    fn connect(
        &self,
        credentials: &BackendCredentials,
    ) -> Result<Box<dyn DriverConnection>, DriverError> {
        let credentials = oracle_credentials(credentials)?;
        let conn = Connection::connect(
            &credentials.user,
            &credentials.password,
            credentials.descriptor(),
        )?;
        apply_default_session_settings(&conn);
        Ok(Box::new(OracleSession::new(conn)))
    }

    fn create_engine(
        &self,
        credentials: &BackendCredentials,
        options: &EngineOptions,
    ) -> Result<Box<dyn DriverEngine>, DriverError> {
        let credentials = oracle_credentials(credentials)?;
        Ok(Box::new(OracleEngine {
            url: credentials.redacted_engine_url(),
            credentials: credentials.clone(),
            max_connections: options.max_connections,
            pool: OnceCell::new(),
        }))
    }
}

/// One Oracle session. Closing it drops the driver handle.
pub struct OracleSession {
    conn: Mutex<Option<Connection>>,
}

impl OracleSession {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("oracle connection lock was poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, OracleError>,
    ) -> Result<T, DriverError> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(DriverError::Closed)?;
        Ok(f(conn)?)
    }
}

fn bind_values(params: &[Value]) -> Vec<Box<dyn ToSql>> {
    params
        .iter()
        .map(|value| -> Box<dyn ToSql> {
            match value {
                Value::Null => Box::new(None::<String>),
                Value::Integer(n) => Box::new(*n),
                Value::Float(f) => Box::new(*f),
                Value::Text(s) => Box::new(s.clone()),
                Value::Timestamp(t) => Box::new(*t),
                Value::Blob(b) => Box::new(b.clone()),
            }
        })
        .collect()
}

fn bind_refs(binds: &[Box<dyn ToSql>]) -> Vec<&dyn ToSql> {
    binds.iter().map(|b| b.as_ref()).collect()
}

fn value_from_sql(value: &SqlValue) -> Result<Value, OracleError> {
    if value.is_null()? {
        return Ok(Value::Null);
    }
    match value.oracle_type()? {
        OracleType::Int64 | OracleType::UInt64 => Ok(Value::Integer(value.get()?)),
        OracleType::Number(_, _) => {
            let text: String = value.get()?;
            Ok(text
                .parse::<i64>()
                .map(Value::Integer)
                .or_else(|_| text.parse::<f64>().map(Value::Float))
                .unwrap_or(Value::Text(text)))
        }
        OracleType::BinaryFloat | OracleType::BinaryDouble | OracleType::Float(_) => {
            Ok(Value::Float(value.get()?))
        }
        OracleType::Date | OracleType::Timestamp(_) => {
            Ok(Value::Timestamp(value.get::<NaiveDateTime>()?))
        }
        OracleType::Raw(_) | OracleType::LongRaw | OracleType::BLOB => {
            Ok(Value::Blob(value.get()?))
        }
        _ => Ok(Value::Text(value.get()?)),
    }
}

fn row_values(row: &OracleRow) -> Result<Row, OracleError> {
    row.sql_values().iter().map(value_from_sql).collect()
}

fn fetch_rows(stmt: &mut Statement, binds: &[Box<dyn ToSql>]) -> Result<QueryOutput, OracleError> {
    let result_set = stmt.query(&bind_refs(binds))?;

    let columns: Vec<String> = result_set
        .column_info()
        .iter()
        .map(|col| col.name().to_string())
        .collect();

    let mut rows = Vec::new();
    for row_result in result_set {
        let row: OracleRow = row_result?;
        rows.push(row_values(&row)?);
    }

    Ok(QueryOutput { columns, rows })
}

impl DriverConnection for OracleSession {
    fn backend(&self) -> Backend {
        Backend::Oracle
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DriverError> {
        let binds = bind_values(params);
        self.with_conn(|conn| {
            let stmt = conn.execute(sql, &bind_refs(&binds))?;
            stmt.row_count()
        })
    }

    fn execute_many(&self, sql: &str, rows: &[Row]) -> Result<u64, DriverError> {
        self.with_conn(|conn| {
            let mut stmt = conn.statement(sql).build()?;
            let mut affected = 0;
            for row in rows {
                let binds = bind_values(row);
                stmt.execute(&bind_refs(&binds))?;
                affected += stmt.row_count()?;
            }
            Ok(affected)
        })
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryOutput, DriverError> {
        let binds = bind_values(params);
        self.with_conn(|conn| {
            let mut stmt = conn.statement(sql).build()?;
            fetch_rows(&mut stmt, &binds)
        })
    }

    fn run(&self, sql: &str, params: &[Value]) -> Result<Execution, DriverError> {
        let binds = bind_values(params);
        self.with_conn(|conn| {
            let mut stmt = conn.statement(sql).build()?;
            if stmt.is_query() {
                fetch_rows(&mut stmt, &binds).map(Execution::Rows)
            } else {
                stmt.execute(&bind_refs(&binds))?;
                Ok(Execution::Affected(stmt.row_count()?))
            }
        })
    }

    fn commit(&self) -> Result<(), DriverError> {
        self.with_conn(|conn| conn.commit())
    }

    fn rollback(&self) -> Result<(), DriverError> {
        self.with_conn(|conn| conn.rollback())
    }

    fn close(&self) -> Result<(), DriverError> {
        let conn = self.lock().take();
        match conn {
            Some(conn) => Ok(conn.close()?),
            None => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.lock().is_none()
    }
}

/// Lazily pooled Oracle engine: the session pool is created on first use.
pub struct OracleEngine {
    url: String,
    credentials: OracleCredentials,
    max_connections: u32,
    pool: OnceCell<Pool>,
}

impl OracleEngine {
    fn pool(&self) -> Result<&Pool, OracleError> {
        self.pool.get_or_try_init(|| {
            debug!(url = %self.url, max_connections = self.max_connections, "creating oracle session pool");
            let mut builder = PoolBuilder::new(
                self.credentials.user.clone(),
                self.credentials.password.clone(),
                self.credentials.descriptor(),
            );
            builder.max_connections(self.max_connections);
            builder.build()
        })
    }
}

impl DriverEngine for OracleEngine {
    fn backend(&self) -> Backend {
        Backend::Oracle
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn connect(&self) -> Result<Box<dyn DriverConnection>, DriverError> {
        let conn = self.pool()?.get()?;
        apply_default_session_settings(&conn);
        Ok(Box::new(OracleSession::new(conn)))
    }
}
