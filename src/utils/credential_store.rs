use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::db::CredentialRecord;
use crate::error::{Error, Result};

pub const DEFAULT_CREDENTIAL_FILE: &str = "connections.json";

/// Named credential records kept in a single JSON file.
///
/// Keys are upper-cased connection names. Reads and writes are plain
/// read-modify-write cycles without locking, so concurrent writers can lose
/// updates.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

fn key_for(connection_name: &str) -> String {
    connection_name.trim().to_uppercase()
}

impl CredentialStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record in the file, keyed by upper-cased name.
    pub fn load_all(&self) -> Result<BTreeMap<String, CredentialRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Error::StoreNotFound(self.path.clone()));
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// The record saved under `connection_name`, matched case-insensitively.
    pub fn load(&self, connection_name: &str) -> Result<CredentialRecord> {
        let mut records = self.load_all()?;
        records
            .remove(&key_for(connection_name))
            .ok_or_else(|| Error::CredentialNotFound {
                name: connection_name.to_string(),
                path: self.path.clone(),
            })
    }

    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.load_all()?.into_keys().collect())
    }

    /// Create or overwrite the record for `connection_name`.
    ///
    /// A missing file is created; an unreadable one is reported rather than
    /// overwritten.
    pub fn save(&self, connection_name: &str, record: &CredentialRecord) -> Result<()> {
        let mut records = match self.load_all() {
            Ok(records) => records,
            Err(Error::StoreNotFound(_)) => {
                debug!(path = %self.path.display(), "creating credential file");
                BTreeMap::new()
            }
            Err(err) => return Err(err),
        };
        records.insert(key_for(connection_name), record.normalized());
        self.write(&records)
    }

    /// Remove the record for `connection_name` and return it.
    pub fn delete(&self, connection_name: &str) -> Result<CredentialRecord> {
        let mut records = self.load_all()?;
        let removed = records
            .remove(&key_for(connection_name))
            .ok_or_else(|| Error::CredentialNotFound {
                name: connection_name.to_string(),
                path: self.path.clone(),
            })?;
        self.write(&records)?;
        Ok(removed)
    }

    fn write(&self, records: &BTreeMap<String, CredentialRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut content = Vec::new();
        let mut serializer =
            Serializer::with_formatter(&mut content, PrettyFormatter::with_indent(b"    "));
        records.serialize(&mut serializer)?;

        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::at(DEFAULT_CREDENTIAL_FILE)
    }
}
