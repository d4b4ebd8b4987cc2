//! StudyHub API server binary.
//!
//! Reads configuration from the environment (and `.env`), with command-line
//! overrides, then serves the API until Ctrl-C.

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use studyhub_api::config::{ApiConfig, BackendKind};
use studyhub_api::{AppState, Backends};
use studyhub_core::db::{PgRoleStore, connect};

const DEFAULT_LOG_FILTER: &str = "info,studyhub_api=debug,studyhub_core=debug";

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "studyhub_api_server", about = "StudyHub API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR")]
    bind: Option<String>,

    /// Backend serving identities, roles and content (`supabase` or `memory`).
    #[arg(long, env = "STUDYHUB_BACKEND")]
    backend: Option<String>,

    /// Serve role lookups from this Postgres database instead of the backend.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Run embedded migrations against `--database-url` before serving.
    #[arg(long, default_value_t = false, requires = "database_url")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(backend) = args.backend.as_deref() {
        config.backend = backend.parse::<BackendKind>()?;
    }

    info!(
        bind = %config.bind_addr,
        backend = config.backend.as_str(),
        provisioning = config.provisioning_enabled,
        "starting studyhub_api_server"
    );

    let mut backends = Backends::from_config(&config)?;

    if let Some(database_url) = args.database_url.as_deref() {
        let pool = connect(database_url).await?;
        if args.migrate {
            info!("running database migrations");
            studyhub_core::migrate::migrate(&pool).await?;
        }
        info!("role lookups served from Postgres");
        backends = backends.with_roles(Arc::new(PgRoleStore::new(pool)));
    }

    let state = AppState::new(config.clone(), backends);
    let shutdown = state.shutdown.clone();
    let app = studyhub_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
