//! `cardexd`: the card catalogue server binary.
//!
//! Usage:
//!   cardexd [-c <context-name-or-path>] [--listen <addr>] [serve]
//!   cardexd [-c <context-name-or-path>] populate
//!
//! The context name resolves to `/etc/cardex/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.
//! Without `-c`, built-in defaults are used.

mod config;
mod routes;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use cardex_core::Module;
use catalog::CatalogModule;
use config::ServerConfig;

/// Pokémon trading-card catalogue server.
#[derive(Parser, Debug)]
#[command(name = "cardexd", about = "Card catalogue server", version)]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config")]
    config: Option<String>,

    /// Listen address (overrides the config file).
    #[arg(long = "listen")]
    listen: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Load the bundled expansions, types and cards, then exit.
    Populate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Load server configuration.
    let server_config = match &cli.config {
        Some(name) => {
            let path = ServerConfig::resolve_path(name);
            info!("Loading configuration from {}", path.display());
            ServerConfig::load(&path)?
        }
        None => ServerConfig::default(),
    };
    let core_config = server_config.service_config(cli.listen.as_deref());

    // Initialize storage.
    if let Some(data_dir) = &core_config.data_dir {
        std::fs::create_dir_all(data_dir)?;
    }
    let sqlite_path = core_config.resolve_sqlite_path();
    let sql: Arc<dyn cardex_sql::SQLStore> = Arc::new(
        cardex_sql::SqliteStore::open(&sqlite_path)
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );
    let blob: Arc<dyn cardex_blob::BlobStore> = Arc::new(
        cardex_blob::FileStore::open(&core_config.resolve_blob_dir())
            .map_err(|e| anyhow::anyhow!("failed to open blob store: {}", e))?,
    );
    info!("Database at {}", sqlite_path.display());

    let catalog = CatalogModule::new(sql, blob, core_config.media_url.clone())
        .map_err(|e| anyhow::anyhow!("failed to initialize catalog: {}", e))?;
    info!("{} module initialized", catalog.name());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Populate => {
            let summary = catalog::seed::populate(catalog.service())
                .map_err(|e| anyhow::anyhow!("population failed: {}", e))?;
            println!("{}", summary);
        }
        Command::Serve => {
            let app = routes::build_router(&[&catalog]);

            let listener = tokio::net::TcpListener::bind(&core_config.listen).await?;
            info!("cardexd listening on {}", core_config.listen);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
