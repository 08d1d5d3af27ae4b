//! Recording fake driver used by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::db::connection::BackendCredentials;
use crate::db::driver::{Driver, DriverConnection, DriverEngine, EngineOptions, Execution};
use crate::db::value::{QueryOutput, Row, Value};
use crate::db::Backend;
use crate::error::DriverError;

/// Statements seen by fake connections, with their binds.
pub type StatementLog = Arc<Mutex<Vec<(String, Vec<Value>)>>>;

type Outputs = Arc<Mutex<VecDeque<QueryOutput>>>;

pub struct FakeDriver {
    backend: Backend,
    fail_with: Option<String>,
    connects: AtomicUsize,
    engines: AtomicUsize,
    log: StatementLog,
    outputs: Outputs,
}

impl FakeDriver {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            fail_with: None,
            connects: AtomicUsize::new(0),
            engines: AtomicUsize::new(0),
            log: StatementLog::default(),
            outputs: Outputs::default(),
        }
    }

    pub fn failing(backend: Backend, message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new(backend)
        }
    }

    /// Queue a result set for the next query run on any of this driver's connections.
    pub fn push_output(&self, output: QueryOutput) {
        self.outputs.lock().unwrap().push_back(output);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn engine_count(&self) -> usize {
        self.engines.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.log.lock().unwrap().clone()
    }

    fn open(&self) -> FakeConnection {
        FakeConnection {
            backend: self.backend,
            closed: AtomicBool::new(false),
            log: Arc::clone(&self.log),
            outputs: Arc::clone(&self.outputs),
        }
    }
}

impl Driver for FakeDriver {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn connect(
        &self,
        _credentials: &BackendCredentials,
    ) -> Result<Box<dyn DriverConnection>, DriverError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_with {
            return Err(DriverError::Other(message.clone()));
        }
        Ok(Box::new(self.open()))
    }

    fn create_engine(
        &self,
        credentials: &BackendCredentials,
        _options: &EngineOptions,
    ) -> Result<Box<dyn DriverEngine>, DriverError> {
        self.engines.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeEngine {
            backend: self.backend,
            url: credentials.redacted_engine_url(),
            log: Arc::clone(&self.log),
            outputs: Arc::clone(&self.outputs),
        }))
    }
}

pub struct FakeConnection {
    backend: Backend,
    closed: AtomicBool,
    log: StatementLog,
    outputs: Outputs,
}

impl FakeConnection {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            closed: AtomicBool::new(false),
            log: StatementLog::default(),
            outputs: Outputs::default(),
        }
    }

    pub fn with_output(self, output: QueryOutput) -> Self {
        self.outputs.lock().unwrap().push_back(output);
        self
    }

    fn record(&self, sql: &str, params: &[Value]) -> Result<(), DriverError> {
        if self.is_closed() {
            return Err(DriverError::Closed);
        }
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(())
    }
}

/// Keyword check standing in for a prepared statement's column count.
fn returns_rows(sql: &str) -> bool {
    let code = sql
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("--"))
        .unwrap_or_default()
        .to_uppercase();
    ["SELECT", "WITH", "PRAGMA", "VALUES"]
        .iter()
        .any(|keyword| code.starts_with(keyword))
}

impl DriverConnection for FakeConnection {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DriverError> {
        self.record(sql, params)?;
        Ok(1)
    }

    fn execute_many(&self, sql: &str, rows: &[Row]) -> Result<u64, DriverError> {
        for row in rows {
            self.record(sql, row)?;
        }
        Ok(rows.len() as u64)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryOutput, DriverError> {
        self.record(sql, params)?;
        Ok(self.outputs.lock().unwrap().pop_front().unwrap_or_default())
    }

    fn run(&self, sql: &str, params: &[Value]) -> Result<Execution, DriverError> {
        if returns_rows(sql) {
            self.query(sql, params).map(Execution::Rows)
        } else {
            self.execute(sql, params).map(Execution::Affected)
        }
    }

    fn commit(&self) -> Result<(), DriverError> {
        self.record("COMMIT", &[])
    }

    fn rollback(&self) -> Result<(), DriverError> {
        self.record("ROLLBACK", &[])
    }

    fn close(&self) -> Result<(), DriverError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct FakeEngine {
    backend: Backend,
    url: String,
    log: StatementLog,
    outputs: Outputs,
}

impl DriverEngine for FakeEngine {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn connect(&self) -> Result<Box<dyn DriverConnection>, DriverError> {
        Ok(Box::new(FakeConnection {
            backend: self.backend,
            closed: AtomicBool::new(false),
            log: Arc::clone(&self.log),
            outputs: Arc::clone(&self.outputs),
        }))
    }
}
