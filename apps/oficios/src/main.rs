use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{ListingController, OficioError, OficioForm, OficioService, RestStore};
use shared::{
    domain::{current_year, year_choices, OficioId},
    protocol::{SortDirection, SortField},
    store::OficioStore,
};
use storage::Storage;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use config::{load_settings, Backend, Settings};

#[derive(Parser, Debug)]
#[command(name = "oficios", about = "Registro de ofícios")]
struct Cli {
    /// TOML settings file; defaults to ./oficios.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides the configured backend (`rest` or `sqlite`).
    #[arg(long, global = true)]
    backend: Option<Backend>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One page of ofícios under the given filters.
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        used: Option<bool>,
        #[arg(long)]
        sort: Option<SortField>,
        #[arg(long, default_value = "desc")]
        direction: SortDirection,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        page_size: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    Show {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Registers a new ofício with the next free number.
    Create {
        #[command(flatten)]
        fields: FormArgs,
        /// Let the `add_oficio` remote function assign the number.
        #[arg(long)]
        via_function: bool,
    },
    /// Edits an existing ofício; omitted fields keep their stored values.
    Update {
        id: i64,
        #[command(flatten)]
        fields: FormArgs,
    },
    /// Years offered by the year filter.
    Years,
}

#[derive(Args, Debug, Default)]
struct FormArgs {
    #[arg(long)]
    ano: Option<i32>,
    #[arg(long)]
    remetente: Option<String>,
    #[arg(long)]
    destinatario: Option<String>,
    #[arg(long)]
    cidade: Option<String>,
    #[arg(long)]
    utilizado: Option<bool>,
    #[arg(long)]
    descricao: Option<String>,
    #[arg(long)]
    assunto: Option<String>,
    #[arg(long)]
    data_envio: Option<String>,
}

impl FormArgs {
    fn apply_to(self, form: &mut OficioForm) {
        if let Some(v) = self.ano {
            form.ano = Some(v);
        }
        if let Some(v) = self.remetente {
            form.remetente = v;
        }
        if let Some(v) = self.destinatario {
            form.destinatario = v;
        }
        if let Some(v) = self.cidade {
            form.cidade = v;
        }
        if let Some(v) = self.utilizado {
            form.utilizado = v;
        }
        if let Some(v) = self.descricao {
            form.descricao = v;
        }
        if let Some(v) = self.assunto {
            form.assunto = v;
        }
        if let Some(v) = self.data_envio {
            form.data_envio = v;
        }
    }
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
    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        settings.backend = backend;
    }
    info!(backend = %settings.backend, "oficios starting");

    match settings.backend {
        Backend::Rest => {
            let store = RestStore::new(settings.rest_config()?)?;
            match cli.command {
                Command::Create {
                    fields,
                    via_function: true,
                } => create_via_function(store, fields).await,
                command => run(store, command, &settings).await,
            }
        }
        Backend::Sqlite => {
            if matches!(
                cli.command,
                Command::Create {
                    via_function: true,
                    ..
                }
            ) {
                bail!("--via-function needs the rest backend");
            }
            let store = Storage::new(&settings.database_url).await?;
            run(store, cli.command, &settings).await
        }
    }
}

async fn run<S: OficioStore>(store: S, command: Command, settings: &Settings) -> Result<()> {
    match command {
        Command::List {
            search,
            year,
            used,
            sort,
            direction,
            page,
            page_size,
            json,
        } => {
            let mut controller =
                ListingController::with_page_size(store, page_size.unwrap_or(settings.page_size));
            controller.set_search(search.unwrap_or_default());
            controller.set_year(year);
            controller.set_is_used(used);

            let loaded = match sort {
                Some(field) => controller.sort_by(field, direction).await,
                None => controller.apply_filters().await,
            };
            let loaded = match loaded {
                Ok(()) if page > 1 => controller.go_to_page(page).await,
                other => other,
            };
            if let Err(err) = loaded {
                let message = controller
                    .last_error()
                    .map(|api_error| api_error.message.clone())
                    .unwrap_or_else(|| err.to_api_error().message);
                bail!(message);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&controller.response())?);
            } else {
                print!("{}", render::render_page(&controller.response(), controller.sort()));
            }
        }
        Command::Show { id, json } => {
            let service = OficioService::new(store);
            let Some(oficio) = service.get(OficioId(id)).await.map_err(operation_failure)? else {
                bail!("ofício {id} não encontrado");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&oficio)?);
            } else {
                print!("{}", render::render_detail(&oficio));
            }
        }
        Command::Create { fields, .. } => {
            let service = OficioService::new(store);
            let mut form = OficioForm::new(current_year());
            fields.apply_to(&mut form);
            let created = service.create(&form).await.map_err(operation_failure)?;
            println!("{}", render::render_detail(&created).trim_end());
        }
        Command::Update { id, fields } => {
            let service = OficioService::new(store);
            let id = OficioId(id);
            let existing = service
                .get(id)
                .await
                .map_err(operation_failure)?
                .with_context(|| format!("ofício {id} não encontrado"))?;
            let mut form = OficioForm::from_oficio(&existing);
            fields.apply_to(&mut form);
            let updated = service
                .update(id, &form)
                .await
                .map_err(operation_failure)?;
            println!("{}", render::render_detail(&updated).trim_end());
        }
        Command::Years => {
            for year in year_choices(current_year()) {
                println!("{year}");
            }
        }
    }
    Ok(())
}

async fn create_via_function(store: RestStore, fields: FormArgs) -> Result<()> {
    let service = OficioService::new(store);
    let mut form = OficioForm::new(current_year());
    fields.apply_to(&mut form);
    match service
        .create_via_function(&form)
        .await
        .map_err(operation_failure)?
    {
        Some(created) => println!("{}", render::render_detail(&created).trim_end()),
        None => println!("ofício enviado para add_oficio"),
    }
    Ok(())
}

/// Reduces a failed operation to the message the operator sees. Unexpected
/// failures are logged in full and reported generically.
fn operation_failure(err: OficioError) -> anyhow::Error {
    match &err {
        OficioError::Unexpected(source) => error!(error = ?source, "unexpected failure"),
        other => warn!(error = %other, "operation failed"),
    }
    anyhow!(err.to_api_error().message)
}
