use tracing::{debug, info};

use crate::db::artifact::{Artifacts, Connection, Engine};
use crate::db::connection::{BackendCredentials, CredentialRecord};
use crate::db::driver::{Driver, EngineOptions};
use crate::db::oracle::OracleDriver;
use crate::db::request::{resolve, CanonicalPlan, ConnectionRequest, PlanStep};
use crate::db::sqlite::SqliteDriver;
use crate::db::Backend;
use crate::error::{Error, Result};
use crate::utils::{AppConfig, CredentialStore};

/// Where the credentials for a connection come from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Look the name up in the credential store.
    Named(String),
    /// Inline credential fields.
    Record(CredentialRecord),
    /// A raw connection string (`user/password@host:port/service` for
    /// Oracle, a database path for SQLite).
    ConnectionString(String),
}

impl CredentialSource {
    pub fn named(name: &str) -> Self {
        CredentialSource::Named(name.to_string())
    }

    fn into_record(self, store: &CredentialStore) -> Result<CredentialRecord> {
        match self {
            CredentialSource::Named(name) => store.load(&name),
            CredentialSource::Record(record) => Ok(record),
            CredentialSource::ConnectionString(s) => {
                Ok(CredentialRecord::new().with("connection_string", s))
            }
        }
    }
}

impl From<CredentialRecord> for CredentialSource {
    fn from(value: CredentialRecord) -> Self {
        CredentialSource::Record(value)
    }
}

/// The real driver for `backend`.
pub fn driver_for(backend: Backend) -> &'static dyn Driver {
    match backend {
        Backend::Oracle => &OracleDriver,
        Backend::Sqlite => &SqliteDriver,
    }
}

fn open_connection(driver: &dyn Driver, credentials: &BackendCredentials) -> Result<Connection> {
    let backend = credentials.backend();
    let inner = driver
        .connect(credentials)
        .map_err(|source| Error::ConnectionFailed { backend, source })?;
    info!(%backend, target = %credentials.display_string(), "connected");
    Ok(Connection::new(backend, inner))
}

fn create_engine(
    driver: &dyn Driver,
    credentials: &BackendCredentials,
    options: &EngineOptions,
) -> Result<Engine> {
    let backend = credentials.backend();
    let inner = driver
        .create_engine(credentials, options)
        .map_err(|source| Error::ConnectionFailed { backend, source })?;
    Ok(Engine::new(backend, inner))
}

/// Create the artifacts of `plan`, strictly in plan order.
///
/// A combined step opens one connection and derives the cursor from it; a
/// lone cursor step opens its own, independent connection. Driver failures
/// are returned as [`Error::ConnectionFailed`] without retrying.
pub fn dispatch(
    plan: &CanonicalPlan,
    driver: &dyn Driver,
    credentials: &BackendCredentials,
    options: &EngineOptions,
) -> Result<Artifacts> {
    let backend = credentials.backend();
    if driver.backend() != backend {
        return Err(Error::UnsupportedBackend {
            backend,
            operation: "dispatch through a different backend's driver",
        });
    }

    let mut artifacts = Artifacts::with_capacity(plan.artifact_count());
    for step in plan {
        debug!(%backend, %step, "creating artifact");
        match step {
            PlanStep::CombinedConnectionCursor => {
                let connection = open_connection(driver, credentials)?;
                let cursor = connection.cursor();
                artifacts.push(connection);
                artifacts.push(cursor);
            }
            PlanStep::Connection => artifacts.push(open_connection(driver, credentials)?),
            PlanStep::Cursor => {
                artifacts.push(open_connection(driver, credentials)?.into_cursor());
            }
            PlanStep::Engine => artifacts.push(create_engine(driver, credentials, options)?),
        }
    }

    Ok(artifacts)
}

/// Resolve the request, gather and validate credentials, then dispatch.
///
/// Validation happens before the driver is touched, so an incomplete record
/// never triggers a connection attempt.
pub fn connect(
    driver: &dyn Driver,
    request: impl Into<ConnectionRequest>,
    source: CredentialSource,
    store: &CredentialStore,
    options: &EngineOptions,
) -> Result<Artifacts> {
    let plan = resolve(request)?;
    let record = source.into_record(store)?;
    let credentials = BackendCredentials::from_record(driver.backend(), &record)?;
    dispatch(&plan, driver, &credentials, options)
}

/// Connect to `backend` using the configured store, defaults and engine options.
pub fn connect_backend(
    backend: Backend,
    source: CredentialSource,
    request: impl Into<ConnectionRequest>,
    config: &AppConfig,
) -> Result<Artifacts> {
    let request = request.into().or(config.default_request());
    connect(
        driver_for(backend),
        request,
        source,
        &config.credential_store(),
        &config.engine_options(),
    )
}

pub fn connect_oracle(
    source: CredentialSource,
    request: impl Into<ConnectionRequest>,
    config: &AppConfig,
) -> Result<Artifacts> {
    connect_backend(Backend::Oracle, source, request, config)
}

pub fn connect_sqlite(
    source: CredentialSource,
    request: impl Into<ConnectionRequest>,
    config: &AppConfig,
) -> Result<Artifacts> {
    connect_backend(Backend::Sqlite, source, request, config)
}
