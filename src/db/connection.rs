use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::db::Backend;
use crate::error::{Error, Result};

pub const DEFAULT_ORACLE_PORT: u16 = 1521;
const SQLITE_SUFFIX: &str = ".db";
const REDACTED: &str = "***";

/// Flat, string-keyed credential bundle as persisted in the credential file.
///
/// Field names are stored lower-cased. Oracle records carry `user`,
/// `password`, `host`, `service` and optionally `port`; SQLite records carry
/// `dbpath`. Either may carry a raw `connection_string` instead.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CredentialRecord {
    fields: BTreeMap<String, String>,
}

impl CredentialRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn oracle(user: &str, password: &str, host: &str, service: &str) -> Self {
        Self::new()
            .with("user", user)
            .with("password", password)
            .with("host", host)
            .with("service", service)
    }

    pub fn sqlite(dbpath: impl AsRef<Path>) -> Self {
        Self::new().with("dbpath", dbpath.as_ref().to_string_lossy())
    }

    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<String>) {
        self.fields.insert(field.trim().to_lowercase(), value.into());
    }

    /// Look up a field by name, case-insensitively. Blank values count as absent.
    pub fn get(&self, field: &str) -> Option<&str> {
        let field = field.to_lowercase();
        self.fields
            .iter()
            .find(|(key, _)| key.to_lowercase() == field)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.trim().is_empty())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Like [`fields`](Self::fields), with secret values masked.
    pub fn redacted_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields().map(|(key, value)| {
            if is_secret(key) {
                (key, REDACTED)
            } else {
                (key, value)
            }
        })
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copy of the record with every field name lower-cased.
    pub fn normalized(&self) -> Self {
        let mut record = Self::new();
        for (key, value) in &self.fields {
            record.insert(key, value.clone());
        }
        record
    }

    fn require(&self, backend: Backend, field: &'static str) -> Result<&str> {
        self.get(field)
            .ok_or(Error::MissingCredentialField { backend, field })
    }
}

/// Fields whose value must never be printed. The connection string embeds
/// the password.
fn is_secret(field: &str) -> bool {
    field.eq_ignore_ascii_case("password") || field.eq_ignore_ascii_case("connection_string")
}

impl<'de> Deserialize<'de> for CredentialRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        let mut record = Self::new();
        for (field, value) in raw {
            record.insert(&field, value);
        }
        Ok(record)
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.redacted_fields()).finish()
    }
}

/// Validated Oracle credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct OracleCredentials {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub service: String,
}

impl OracleCredentials {
    pub fn new(user: &str, password: &str, host: &str, service: &str) -> Result<Self> {
        let fields = [
            ("user", user),
            ("password", password),
            ("host", host),
            ("service", service),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(Error::MissingCredentialField {
                    backend: Backend::Oracle,
                    field,
                });
            }
        }

        Ok(Self {
            user: user.to_string(),
            password: password.to_string(),
            host: host.to_string(),
            port: DEFAULT_ORACLE_PORT,
            service: service.to_string(),
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Parse `user/password@host[:port]/service`.
    pub fn parse(connection_string: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidConnectionString {
            backend: Backend::Oracle,
            reason: reason.to_string(),
        };

        let (login, address) = connection_string
            .trim()
            .rsplit_once('@')
            .ok_or_else(|| invalid("expected user/password@host:port/service"))?;
        let (user, password) = login.split_once('/').unwrap_or((login, ""));

        let address = address.trim_start_matches("//");
        let (host_port, service) = address.split_once('/').unwrap_or((address, ""));
        let (host, port) = match host_port.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| invalid(&format!("invalid port {port:?}")))?;
                (host, port)
            }
            None => (host_port, DEFAULT_ORACLE_PORT),
        };

        Ok(Self::new(user, password, host, service)?.with_port(port))
    }

    pub fn from_record(record: &CredentialRecord) -> Result<Self> {
        if let Some(connection_string) = record.get("connection_string") {
            return Self::parse(connection_string);
        }

        let backend = Backend::Oracle;
        let credentials = Self::new(
            record.require(backend, "user")?,
            record.require(backend, "password")?,
            record.require(backend, "host")?,
            record.require(backend, "service")?,
        )?;

        match record.get("port") {
            Some(port) => {
                let port = port.trim().parse::<u16>().map_err(|_| {
                    Error::InvalidConnectionString {
                        backend,
                        reason: format!("invalid port {port:?}"),
                    }
                })?;
                Ok(credentials.with_port(port))
            }
            None => Ok(credentials),
        }
    }

    /// `user/password@host:port/service`
    pub fn connection_string(&self) -> String {
        format!(
            "{}/{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.service
        )
    }

    /// Engine URL: the connection string with its first `/` turned into `:`,
    /// under the `oracle://` scheme.
    pub fn engine_url(&self) -> String {
        format!("oracle://{}", self.connection_string().replacen('/', ":", 1))
    }

    pub fn redacted_engine_url(&self) -> String {
        format!(
            "oracle://{}:{}@{}:{}/{}",
            self.user, REDACTED, self.host, self.port, self.service
        )
    }

    /// EZConnect descriptor handed to the driver.
    pub fn descriptor(&self) -> String {
        format!("//{}:{}/{}", self.host, self.port, self.service)
    }

    pub fn display_string(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.service)
    }

    /// Securely clear the password from memory by overwriting with zeros
    /// then releasing the allocation.
    pub fn clear_password(&mut self) {
        // SAFETY: zero bytes are valid UTF-8.
        let bytes = unsafe { self.password.as_bytes_mut() };
        for b in bytes.iter_mut() {
            // write_volatile keeps the compiler from eliding the zeroing
            unsafe { std::ptr::write_volatile(b, 0) };
        }
        self.password.clear();
        self.password.shrink_to_fit();
    }
}

impl Drop for OracleCredentials {
    fn drop(&mut self) {
        self.clear_password();
    }
}

impl fmt::Debug for OracleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleCredentials")
            .field("user", &self.user)
            .field("password", &REDACTED)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("service", &self.service)
            .finish()
    }
}

impl From<&OracleCredentials> for CredentialRecord {
    fn from(credentials: &OracleCredentials) -> Self {
        let record = CredentialRecord::oracle(
            &credentials.user,
            &credentials.password,
            &credentials.host,
            &credentials.service,
        );
        if credentials.port == DEFAULT_ORACLE_PORT {
            record
        } else {
            record.with("port", credentials.port.to_string())
        }
    }
}

/// Validated SQLite credentials: just a database path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteCredentials {
    dbpath: PathBuf,
}

impl SqliteCredentials {
    pub fn new(dbpath: impl Into<PathBuf>) -> Result<Self> {
        let dbpath = dbpath.into();
        if dbpath.as_os_str().is_empty() {
            return Err(Error::MissingCredentialField {
                backend: Backend::Sqlite,
                field: "dbpath",
            });
        }
        Ok(Self { dbpath })
    }

    pub fn from_record(record: &CredentialRecord) -> Result<Self> {
        let dbpath = match record.get("connection_string") {
            Some(path) => path,
            None => record.require(Backend::Sqlite, "dbpath")?,
        };
        Self::new(dbpath)
    }

    /// Database file path, with `.db` appended when missing.
    pub fn path(&self) -> PathBuf {
        if self.dbpath.to_string_lossy().ends_with(SQLITE_SUFFIX) {
            return self.dbpath.clone();
        }
        let mut path = OsString::from(self.dbpath.as_os_str());
        path.push(SQLITE_SUFFIX);
        PathBuf::from(path)
    }

    pub fn connection_string(&self) -> String {
        self.path().to_string_lossy().into_owned()
    }

    pub fn engine_url(&self) -> String {
        format!("sqlite:///{}", self.connection_string())
    }
}

/// Credentials for one backend, validated at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCredentials {
    Oracle(OracleCredentials),
    Sqlite(SqliteCredentials),
}

impl BackendCredentials {
    /// Build typed credentials for `backend`, failing fast on missing fields.
    pub fn from_record(backend: Backend, record: &CredentialRecord) -> Result<Self> {
        match backend {
            Backend::Oracle => OracleCredentials::from_record(record).map(Self::Oracle),
            Backend::Sqlite => SqliteCredentials::from_record(record).map(Self::Sqlite),
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            BackendCredentials::Oracle(_) => Backend::Oracle,
            BackendCredentials::Sqlite(_) => Backend::Sqlite,
        }
    }

    pub fn connection_string(&self) -> String {
        match self {
            BackendCredentials::Oracle(c) => c.connection_string(),
            BackendCredentials::Sqlite(c) => c.connection_string(),
        }
    }

    pub fn engine_url(&self) -> String {
        match self {
            BackendCredentials::Oracle(c) => c.engine_url(),
            BackendCredentials::Sqlite(c) => c.engine_url(),
        }
    }

    /// Engine URL safe to print or log.
    pub fn redacted_engine_url(&self) -> String {
        match self {
            BackendCredentials::Oracle(c) => c.redacted_engine_url(),
            BackendCredentials::Sqlite(c) => c.engine_url(),
        }
    }

    pub fn display_string(&self) -> String {
        match self {
            BackendCredentials::Oracle(c) => c.display_string(),
            BackendCredentials::Sqlite(c) => c.connection_string(),
        }
    }
}

impl From<OracleCredentials> for BackendCredentials {
    fn from(value: OracleCredentials) -> Self {
        BackendCredentials::Oracle(value)
    }
}

impl From<SqliteCredentials> for BackendCredentials {
    fn from(value: SqliteCredentials) -> Self {
        BackendCredentials::Sqlite(value)
    }
}
