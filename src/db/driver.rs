use crate::db::connection::BackendCredentials;
use crate::db::value::{QueryOutput, Row, Value};
use crate::db::Backend;
use crate::error::DriverError;

pub const DEFAULT_ENGINE_MAX_CONNECTIONS: u32 = 5;

/// Knobs for engines built by a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub max_connections: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_ENGINE_MAX_CONNECTIONS,
        }
    }
}

/// Outcome of a statement whose kind is only known once it is prepared.
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    Rows(QueryOutput),
    Affected(u64),
}

/// An open connection as seen through a database driver.
///
/// Implementations must be safe to share between a connection artifact and
/// the cursors derived from it.
pub trait DriverConnection: Send + Sync {
    fn backend(&self) -> Backend;

    /// Run a statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DriverError>;

    /// Run one statement once per row of binds.
    fn execute_many(&self, sql: &str, rows: &[Row]) -> Result<u64, DriverError>;

    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryOutput, DriverError>;

    /// Prepare `sql`, then fetch its rows if it produces any or run it otherwise.
    fn run(&self, sql: &str, params: &[Value]) -> Result<Execution, DriverError>;

    fn commit(&self) -> Result<(), DriverError>;

    fn rollback(&self) -> Result<(), DriverError>;

    /// Close the connection; later calls fail with [`DriverError::Closed`].
    fn close(&self) -> Result<(), DriverError>;

    fn is_closed(&self) -> bool;
}

/// Connection factory bound to one set of credentials.
pub trait DriverEngine: Send + Sync {
    fn backend(&self) -> Backend;

    /// Engine URL with any password redacted.
    fn url(&self) -> &str;

    fn connect(&self) -> Result<Box<dyn DriverConnection>, DriverError>;
}

/// Entry point into one backend's driver.
pub trait Driver: Sync {
    fn backend(&self) -> Backend;

    fn connect(
        &self,
        credentials: &BackendCredentials,
    ) -> Result<Box<dyn DriverConnection>, DriverError>;

    fn create_engine(
        &self,
        credentials: &BackendCredentials,
        options: &EngineOptions,
    ) -> Result<Box<dyn DriverEngine>, DriverError>;
}

pub(crate) fn wrong_backend(driver: Backend, credentials: &BackendCredentials) -> DriverError {
    DriverError::Other(format!(
        "{driver} driver cannot use {} credentials",
        credentials.backend()
    ))
}
