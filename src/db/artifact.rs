use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::db::driver::{DriverConnection, DriverEngine, Execution};
use crate::db::request::ArtifactKind;
use crate::db::value::{QueryOutput, Row, Value};
use crate::error::{Error, Result};

/// Target database system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Oracle,
    Sqlite,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Oracle => "oracle",
            Backend::Sqlite => "sqlite",
        }
    }

    /// Positional bind placeholder for the 1-based `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Backend::Oracle => format!(":{index}"),
            Backend::Sqlite => format!("?{index}"),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend and kind of an artifact, known from the moment it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactTag {
    pub backend: Backend,
    pub kind: ArtifactKind,
}

impl fmt::Display for ArtifactTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.backend, self.kind)
    }
}

/// A live database connection.
pub struct Connection {
    backend: Backend,
    inner: Arc<dyn DriverConnection>,
}

impl Connection {
    pub fn new(backend: Backend, inner: Box<dyn DriverConnection>) -> Self {
        Self {
            backend,
            inner: Arc::from(inner),
        }
    }

    pub fn tag(&self) -> ArtifactTag {
        ArtifactTag {
            backend: self.backend,
            kind: ArtifactKind::Connection,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Derive a cursor that runs on this connection.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.backend, Arc::clone(&self.inner))
    }

    /// Turn the connection into a cursor that owns it.
    pub fn into_cursor(self) -> Cursor {
        Cursor::new(self.backend, self.inner)
    }

    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        Ok(self.inner.execute(sql, params)?)
    }

    pub fn query(&self, sql: &str, params: &[Value]) -> Result<QueryOutput> {
        Ok(self.inner.query(sql, params)?)
    }

    pub fn commit(&self) -> Result<()> {
        Ok(self.inner.commit()?)
    }

    pub fn rollback(&self) -> Result<()> {
        Ok(self.inner.rollback()?)
    }

    /// Close the connection. Cursors derived from it stop working.
    pub fn close(&self) -> Result<()> {
        Ok(self.inner.close()?)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.backend)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Statement handle bound to one connection, buffering the last result set.
pub struct Cursor {
    backend: Backend,
    conn: Arc<dyn DriverConnection>,
    description: Vec<String>,
    pending: VecDeque<Row>,
    row_count: Option<u64>,
}

impl Cursor {
    fn new(backend: Backend, conn: Arc<dyn DriverConnection>) -> Self {
        Self {
            backend,
            conn,
            description: Vec::new(),
            pending: VecDeque::new(),
            row_count: None,
        }
    }

    pub fn tag(&self) -> ArtifactTag {
        ArtifactTag {
            backend: self.backend,
            kind: ArtifactKind::Cursor,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Another cursor on the same connection.
    pub fn sibling(&self) -> Cursor {
        Cursor::new(self.backend, Arc::clone(&self.conn))
    }

    /// True when both handles run on the very same driver connection.
    pub fn shares_connection_with(&self, connection: &Connection) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.conn) as *const (),
            Arc::as_ptr(&connection.inner) as *const (),
        )
    }

    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<&mut Self> {
        self.reset();
        match self.conn.run(sql, params)? {
            Execution::Rows(output) => {
                self.row_count = Some(output.rows.len() as u64);
                self.description = output.columns;
                self.pending = output.rows.into();
            }
            Execution::Affected(count) => self.row_count = Some(count),
        }
        Ok(self)
    }

    pub fn execute_many(&mut self, sql: &str, rows: &[Row]) -> Result<&mut Self> {
        self.reset();
        self.row_count = Some(self.conn.execute_many(sql, rows)?);
        Ok(self)
    }

    pub fn fetch_one(&mut self) -> Option<Row> {
        self.pending.pop_front()
    }

    pub fn fetch_many(&mut self, size: usize) -> Vec<Row> {
        let size = size.min(self.pending.len());
        self.pending.drain(..size).collect()
    }

    pub fn fetch_all(&mut self) -> Vec<Row> {
        self.pending.drain(..).collect()
    }

    /// Column names of the last query.
    pub fn description(&self) -> &[String] {
        &self.description
    }

    /// Rows fetched by the last query or affected by the last statement.
    pub fn row_count(&self) -> Option<u64> {
        self.row_count
    }

    pub fn commit(&self) -> Result<()> {
        Ok(self.conn.commit()?)
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }

    fn reset(&mut self) {
        self.description.clear();
        self.pending.clear();
        self.row_count = None;
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("backend", &self.backend)
            .field("description", &self.description)
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Connection factory for one set of credentials.
pub struct Engine {
    backend: Backend,
    inner: Box<dyn DriverEngine>,
}

impl Engine {
    pub fn new(backend: Backend, inner: Box<dyn DriverEngine>) -> Self {
        Self { backend, inner }
    }

    pub fn tag(&self) -> ArtifactTag {
        ArtifactTag {
            backend: self.backend,
            kind: ArtifactKind::Engine,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Engine URL with the password redacted.
    pub fn url(&self) -> &str {
        self.inner.url()
    }

    pub fn connect(&self) -> Result<Connection> {
        let inner = self
            .inner
            .connect()
            .map_err(|source| Error::ConnectionFailed {
                backend: self.backend,
                source,
            })?;
        Ok(Connection::new(self.backend, inner))
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("backend", &self.backend)
            .field("url", &self.url())
            .finish()
    }
}

/// Any artifact handed back by a dispatch.
#[derive(Debug)]
pub enum Artifact {
    Connection(Connection),
    Cursor(Cursor),
    Engine(Engine),
}

impl Artifact {
    pub fn tag(&self) -> ArtifactTag {
        match self {
            Artifact::Connection(c) => c.tag(),
            Artifact::Cursor(c) => c.tag(),
            Artifact::Engine(e) => e.tag(),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.tag().kind
    }

    pub fn backend(&self) -> Backend {
        self.tag().backend
    }
}

impl From<Connection> for Artifact {
    fn from(value: Connection) -> Self {
        Artifact::Connection(value)
    }
}

impl From<Cursor> for Artifact {
    fn from(value: Cursor) -> Self {
        Artifact::Cursor(value)
    }
}

impl From<Engine> for Artifact {
    fn from(value: Engine) -> Self {
        Artifact::Engine(value)
    }
}

/// Artifacts produced by one dispatch, ordered connection, cursor, engine.
#[derive(Debug, Default)]
pub struct Artifacts {
    items: Vec<Artifact>,
}

impl Artifacts {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, artifact: impl Into<Artifact>) {
        self.items.push(artifact.into());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn tags(&self) -> Vec<ArtifactTag> {
        self.items.iter().map(Artifact::tag).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.items.iter()
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.items.iter().find_map(|a| match a {
            Artifact::Connection(c) => Some(c),
            _ => None,
        })
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.items.iter().find_map(|a| match a {
            Artifact::Cursor(c) => Some(c),
            _ => None,
        })
    }

    pub fn engine(&self) -> Option<&Engine> {
        self.items.iter().find_map(|a| match a {
            Artifact::Engine(e) => Some(e),
            _ => None,
        })
    }

    /// The lone artifact, when exactly one was produced.
    pub fn into_single(self) -> Option<Artifact> {
        if self.items.len() != 1 {
            return None;
        }
        self.items.into_iter().next()
    }

    pub fn into_parts(self) -> (Option<Connection>, Option<Cursor>, Option<Engine>) {
        let mut parts = (None, None, None);
        for artifact in self.items {
            match artifact {
                Artifact::Connection(c) => parts.0 = Some(c),
                Artifact::Cursor(c) => parts.1 = Some(c),
                Artifact::Engine(e) => parts.2 = Some(e),
            }
        }
        parts
    }

    pub fn into_vec(self) -> Vec<Artifact> {
        self.items
    }
}

impl IntoIterator for Artifacts {
    type Item = Artifact;
    type IntoIter = std::vec::IntoIter<Artifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Anything SQL can be run through.
///
/// Connections hand out a cursor on themselves, cursors hand out a sibling on
/// the same connection and engines check out a fresh connection.
pub trait Connector {
    fn backend(&self) -> Backend;
    fn open_cursor(&self) -> Result<Cursor>;
}

impl Connector for Connection {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn open_cursor(&self) -> Result<Cursor> {
        Ok(self.cursor())
    }
}

impl Connector for Cursor {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn open_cursor(&self) -> Result<Cursor> {
        Ok(self.sibling())
    }
}

impl Connector for Engine {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn open_cursor(&self) -> Result<Cursor> {
        Ok(self.connect()?.into_cursor())
    }
}

impl Connector for Artifact {
    fn backend(&self) -> Backend {
        Artifact::backend(self)
    }

    fn open_cursor(&self) -> Result<Cursor> {
        match self {
            Artifact::Connection(c) => c.open_cursor(),
            Artifact::Cursor(c) => c.open_cursor(),
            Artifact::Engine(e) => e.open_cursor(),
        }
    }
}
