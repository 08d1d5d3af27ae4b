use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::db::{CommitPolicy, ConnectionRequest, EngineOptions, DEFAULT_ENGINE_MAX_CONNECTIONS};
use crate::error::Result;
use crate::utils::credential_store::{CredentialStore, DEFAULT_CREDENTIAL_FILE};

/// Environment variable that points at an alternative config file.
pub const CONFIG_ENV: &str = "NSDS_CONFIG";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// JSON file holding the named credential records.
    pub credential_file: PathBuf,
    /// Artifact kinds opened when a caller does not ask for any.
    pub default_request: Vec<String>,
    /// What to do with the commit that follows a table insert.
    pub commit_policy: CommitPolicy,
    pub engine_max_connections: u32,
    pub log_level: String,
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            credential_file: PathBuf::from(DEFAULT_CREDENTIAL_FILE),
            default_request: vec!["connection".to_string()],
            commit_policy: CommitPolicy::default(),
            engine_max_connections: DEFAULT_ENGINE_MAX_CONNECTIONS,
            log_level: "info".to_string(),
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|mut path| {
            path.push("nsds");
            path.push("config.json");
            path
        })
    }

    /// Load the config file, falling back to defaults when it is missing or invalid.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::new(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::new();
        }
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot read config; using defaults");
                return Self::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "invalid config; using defaults");
                Self::new()
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        match Self::config_path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::at(&self.credential_file)
    }

    pub fn default_request(&self) -> ConnectionRequest {
        ConnectionRequest::Many(self.default_request.clone())
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            max_connections: self.engine_max_connections,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}
