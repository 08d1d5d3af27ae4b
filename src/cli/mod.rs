pub mod conn;
pub mod conn_handler;
pub mod db_handler;

pub use conn::ConnArgs;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use nsds::db::{Backend, CredentialSource, Fetch, TableScope};

/// Oracle and SQLite connection helpers
#[derive(Parser)]
#[command(name = "nsds", version, about = "Open Oracle and SQLite connections from saved credentials")]
pub struct Cli {
    /// Config file (default: <config dir>/nsds/config.json or NSDS_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Credential file, overriding the configured one
    #[arg(long, global = true)]
    pub credentials: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage saved credentials
    Conn(ConnArgs),

    /// Open the requested artifacts and report what was opened
    Connect {
        backend: BackendArg,

        #[command(flatten)]
        source: SourceArgs,

        /// Artifact kind to open (connection, cursor, engine, all); repeatable
        #[arg(long = "kind", short = 'k')]
        kinds: Vec<String>,
    },

    /// List tables whose name contains PATTERN
    Tables {
        backend: BackendArg,

        #[command(flatten)]
        source: SourceArgs,

        pattern: Option<String>,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// Check whether a table exists
    Exists {
        backend: BackendArg,

        #[command(flatten)]
        source: SourceArgs,

        /// Table name, optionally prefixed with its owner
        table: String,

        #[arg(long)]
        owner: Option<String>,

        #[arg(long, value_enum, default_value_t = ScopeArg::Dba)]
        scope: ScopeArg,
    },

    /// List columns whose name contains COLUMN (Oracle only)
    Columns {
        backend: BackendArg,

        #[command(flatten)]
        source: SourceArgs,

        column: String,

        /// Only tables whose name contains this
        #[arg(long)]
        table: Option<String>,

        #[command(flatten)]
        search: SearchArgs,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Oracle,
    Sqlite,
}

impl From<BackendArg> for Backend {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Oracle => Backend::Oracle,
            BackendArg::Sqlite => Backend::Sqlite,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    Dba,
    All,
    User,
}

impl From<ScopeArg> for TableScope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Dba => TableScope::Dba,
            ScopeArg::All => TableScope::All,
            ScopeArg::User => TableScope::User,
        }
    }
}

/// Exactly one way of finding the credentials.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Saved connection name
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// SQLite database path (".db" is appended when missing)
    #[arg(long)]
    pub dbpath: Option<PathBuf>,

    /// Oracle "user/password@host[:port]/service" string
    #[arg(long, env = "NSDS_CONNECTION_STRING", hide_env_values = true)]
    pub connection_string: Option<String>,
}

impl SourceArgs {
    pub fn into_source(self) -> CredentialSource {
        if let Some(name) = self.name {
            CredentialSource::Named(name)
        } else if let Some(dbpath) = self.dbpath {
            CredentialSource::ConnectionString(dbpath.to_string_lossy().into_owned())
        } else {
            CredentialSource::ConnectionString(self.connection_string.unwrap_or_default())
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[arg(long, value_enum, default_value_t = ScopeArg::Dba)]
    pub scope: ScopeArg,

    /// Return at most this many rows
    #[arg(long)]
    pub limit: Option<usize>,
}

impl SearchArgs {
    pub fn fetch(&self) -> Fetch {
        match self.limit {
            Some(n) => Fetch::First(n),
            None => Fetch::All,
        }
    }
}
