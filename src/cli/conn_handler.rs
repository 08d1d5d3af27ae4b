//! CLI handler for `nsds conn` subcommands.

use anyhow::Context;

use nsds::db::{Backend, BackendCredentials, CredentialRecord};
use nsds::utils::CredentialStore;

use super::conn::{ConnArgs, ConnCommand};

pub fn run(args: ConnArgs, store: &CredentialStore) -> anyhow::Result<()> {
    match args.command {
        ConnCommand::Save {
            name,
            backend,
            user,
            password,
            host,
            port,
            service,
            dbpath,
        } => {
            let backend = Backend::from(backend);
            let mut record = CredentialRecord::new();
            let fields = [
                ("user", user),
                ("password", password),
                ("host", host),
                ("port", port.map(|p| p.to_string())),
                ("service", service),
                ("dbpath", dbpath.map(|p| p.to_string_lossy().into_owned())),
            ];
            for (field, value) in fields {
                if let Some(value) = value {
                    record.insert(field, value);
                }
            }

            let credentials = BackendCredentials::from_record(backend, &record)
                .with_context(|| format!("incomplete {backend} credentials for {name}"))?;
            store
                .save(&name, &record)
                .with_context(|| format!("failed to write {}", store.path().display()))?;
            eprintln!("saved {} ({})", name.to_uppercase(), credentials.display_string());
        }
        ConnCommand::Show { name, reveal } => {
            let record = store.load(&name)?;
            for line in show_lines(&record, reveal) {
                println!("{line}");
            }
        }
        ConnCommand::List => {
            let names = store.names()?;
            if names.is_empty() {
                eprintln!("no saved connections in {}", store.path().display());
            }
            for name in names {
                println!("{name}");
            }
        }
        ConnCommand::Delete { name } => {
            store.delete(&name)?;
            eprintln!("deleted {}", name.to_uppercase());
        }
    }
    Ok(())
}

/// `field: value` lines for `conn show`, secrets masked unless `reveal`.
fn show_lines(record: &CredentialRecord, reveal: bool) -> Vec<String> {
    let format = |(field, value): (&str, &str)| format!("{field}: {value}");
    if reveal {
        record.fields().map(format).collect()
    } else {
        record.redacted_fields().map(format).collect()
    }
}
