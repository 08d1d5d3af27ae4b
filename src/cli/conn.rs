use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::BackendArg;

#[derive(Parser)]
pub struct ConnArgs {
    #[command(subcommand)]
    pub command: ConnCommand,
}

#[derive(Subcommand)]
pub enum ConnCommand {
    /// Save (or overwrite) a named credential record
    Save {
        name: String,

        backend: BackendArg,

        #[arg(long)]
        user: Option<String>,

        /// Password (or NSDS_PASSWORD env var)
        #[arg(long, env = "NSDS_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        #[arg(long)]
        service: Option<String>,

        #[arg(long)]
        dbpath: Option<PathBuf>,
    },

    /// Print a saved record
    Show {
        name: String,

        /// Print the password instead of masking it
        #[arg(long)]
        reveal: bool,
    },

    /// List saved connection names
    List,

    /// Remove a saved record
    Delete { name: String },
}
