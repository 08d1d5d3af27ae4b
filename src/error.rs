//! Error types for nsds.

use std::path::PathBuf;

use thiserror::Error;

use crate::db::Backend;

/// Errors raised by a database driver once a request reaches it.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("oracle error: {0}")]
    Oracle(#[from] oracle::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The underlying connection was closed by its owner.
    #[error("connection is closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// Common error type for nsds.
#[derive(Error, Debug)]
pub enum Error {
    /// A connection-type request named something other than
    /// connection, cursor, engine or all.
    #[error("invalid connection type {0:?}: expected connection, cursor, engine or all")]
    InvalidArtifactKind(String),

    /// A credential record lacks a field the backend needs to connect.
    #[error("{backend} credentials are missing the `{field}` field")]
    MissingCredentialField {
        backend: Backend,
        field: &'static str,
    },

    #[error("connection {name} not found in {}", .path.display())]
    CredentialNotFound { name: String, path: PathBuf },

    #[error("credential file {} not found", .0.display())]
    StoreNotFound(PathBuf),

    /// The driver refused to open a connection or engine.
    #[error("failed to connect to {backend}: {source}")]
    ConnectionFailed {
        backend: Backend,
        #[source]
        source: DriverError,
    },

    #[error("{operation} is not supported for {backend}")]
    UnsupportedBackend {
        backend: Backend,
        operation: &'static str,
    },

    #[error("invalid {backend} connection string: {reason}")]
    InvalidConnectionString { backend: Backend, reason: String },

    #[error("invalid column definitions: {0}")]
    InvalidColumns(String),

    #[error("table {0} already exists")]
    TableExists(String),

    /// A driver error raised after the connection was established.
    #[error("database error: {0}")]
    Driver(#[from] DriverError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for nsds operations.
pub type Result<T> = std::result::Result<T, Error>;
