//! CLI entry point; the commands that open a connection are handled here.

use anyhow::Context;

use nsds::db::{
    connect_backend, find_column, find_table, table_exists, Artifact, Backend, ConnectionRequest,
    Row,
};
use nsds::utils::AppConfig;

use super::{BackendArg, Command};

pub fn run(command: Command, config: &AppConfig) -> anyhow::Result<()> {
    match command {
        Command::Conn(args) => super::conn_handler::run(args, &config.credential_store())?,
        Command::Connect {
            backend,
            source,
            kinds,
        } => {
            let backend = Backend::from(backend);
            let artifacts = connect_backend(
                backend,
                source.into_source(),
                ConnectionRequest::Many(kinds),
                config,
            )
            .with_context(|| format!("failed to connect to {backend}"))?;

            for artifact in artifacts {
                match &artifact {
                    Artifact::Engine(engine) => println!("{}\t{}", artifact.tag(), engine.url()),
                    _ => println!("{}", artifact.tag()),
                }
                if let Artifact::Connection(conn) = &artifact {
                    conn.close()?;
                }
            }
        }
        Command::Tables {
            backend,
            source,
            pattern,
            search,
        } => {
            let conn = open(backend, source, config)?;
            let rows = find_table(&conn, pattern.as_deref(), search.scope.into(), search.fetch())?;
            print_rows(&rows);
        }
        Command::Exists {
            backend,
            source,
            table,
            owner,
            scope,
        } => {
            let conn = open(backend, source, config)?;
            let exists = table_exists(&conn, &table, scope.into(), owner.as_deref())?;
            println!("{exists}");
        }
        Command::Columns {
            backend,
            source,
            column,
            table,
            search,
        } => {
            let conn = open(backend, source, config)?;
            let rows = find_column(
                &conn,
                &column,
                table.as_deref(),
                search.scope.into(),
                search.fetch(),
            )?;
            print_rows(&rows);
        }
    }
    Ok(())
}

/// A single connection for the introspection commands.
fn open(
    backend: BackendArg,
    source: super::SourceArgs,
    config: &AppConfig,
) -> anyhow::Result<Artifact> {
    let backend = Backend::from(backend);
    let artifacts = connect_backend(backend, source.into_source(), "connection", config)
        .with_context(|| format!("failed to connect to {backend}"))?;
    artifacts
        .into_single()
        .context("no connection was opened")
}

fn print_rows(rows: &[Row]) {
    for row in rows {
        let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
        println!("{}", cells.join("\t"));
    }
    eprintln!("{} row(s)", rows.len());
}
