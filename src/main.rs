mod config;
mod entities;
mod error;
mod models;
mod pagination;
mod routes;
mod services;
mod state;
mod utils;

use clap::Parser;
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use config::{Config, StorageConfig};
use routes::create_routes;
use services::s3::S3ArtifactStore;
use services::storage::{ArtifactStore, LocalArtifactStore};
use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "annotation-kit", about = "Image annotation backend", version)]
struct Cli {
    /// Address to listen on; overrides BIND_ADDR.
    #[arg(long, env = "BIND_ADDR")]
    bind: Option<String>,

    /// Start without applying pending database migrations.
    #[arg(long)]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,annotation_kit=debug,tower_http=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let db = Database::connect(&config.database_url).await?;
    tracing::info!("connected to database");

    if cli.skip_migrations {
        tracing::warn!("skipping database migrations");
    } else {
        Migrator::up(&db, None).await?;
        tracing::info!("migrations applied");
    }

    let artifacts: Arc<dyn ArtifactStore> = match &config.storage {
        StorageConfig::Local { root } => {
            let store = LocalArtifactStore::new(root);
            tracing::info!(
                working = %store.working_dir().display(),
                finalized = %store.final_dir().display(),
                "storing artifacts on local disk"
            );
            Arc::new(store)
        }
        StorageConfig::S3(settings) => {
            let store = S3ArtifactStore::new(settings);
            store.ensure_bucket_exists().await?;
            tracing::info!(bucket = %settings.bucket_name, prefix = %settings.prefix, "storing artifacts in S3");
            Arc::new(store)
        }
    };

    let bind_addr = cli.bind.unwrap_or_else(|| config.bind_addr.clone());
    let app = create_routes(AppState::new(db, artifacts, config));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
