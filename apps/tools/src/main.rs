use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::domain::Oficio;
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/oficios.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Creates the database file and applies migrations.
    Init,
    /// Loads a JSON array of ofícios, keeping their ids and numbers.
    Import { input: PathBuf },
    /// Writes every ofício as a JSON array, to stdout unless `--output` is set.
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::Init => {
            storage.health_check().await?;
            println!("database ready at {}", cli.database_url);
        }
        Command::Import { input } => {
            let raw = fs::read_to_string(&input)
                .with_context(|| format!("failed to read '{}'", input.display()))?;
            let imported = import_oficios(&storage, &raw).await?;
            println!("imported {imported} oficio(s)");
        }
        Command::Export { output } => {
            let json = export_oficios(&storage).await?;
            match output {
                Some(path) => {
                    fs::write(&path, json)
                        .with_context(|| format!("failed to write '{}'", path.display()))?;
                    info!(path = %path.display(), "export written");
                }
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}

async fn import_oficios(storage: &Storage, raw: &str) -> Result<usize> {
    let records: Vec<Oficio> =
        serde_json::from_str(raw).context("expected a JSON array of oficios")?;
    let imported = storage.restore_oficios(&records).await?;
    info!(count = imported, "oficios imported");
    Ok(imported)
}

async fn export_oficios(storage: &Storage) -> Result<String> {
    let records = storage.all_oficios().await?;
    info!(count = records.len(), "oficios exported");
    Ok(serde_json::to_string_pretty(&records)?)
}
