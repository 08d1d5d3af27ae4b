mod cli;

use anyhow::Context;
use clap::Parser;
use cli::Cli;

use nsds::utils::AppConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    if let Some(path) = cli.credentials {
        config.credential_file = path;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    nsds::logging::init(&config.log_level).context("failed to initialise logging")?;

    cli::db_handler::run(cli.command, &config)
}
