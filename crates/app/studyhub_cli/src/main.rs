// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands};
use studyhub_core::auth::{AdminProvisioner, RoleStore};
use studyhub_core::db::{PgRoleStore, connect};
use studyhub_core::supabase::{SupabaseAuth, SupabaseConfig, SupabaseRest};

mod cli;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    logging::init()?;

    let args = Cli::parse();

    match args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::CreateAdmin {
            email,
            password,
            supabase_url,
            service_role_key,
            database_url,
        } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(create_admin(
                &email,
                &password,
                supabase_url,
                service_role_key,
                database_url,
            ))?;
        }
        Commands::Migrate { database_url } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async {
                let pool = connect(&database_url).await?;
                studyhub_core::migrate::migrate(&pool)
                    .await
                    .map_err(studyhub_core::db::DbError::from)?;
                log::info!("migrations applied");
                Ok::<_, Error>(())
            })?;
        }
    }

    Ok(())
}

async fn create_admin(
    email: &str,
    password: &str,
    supabase_url: String,
    service_role_key: String,
    database_url: Option<String>,
) -> Result<()> {
    let config = SupabaseConfig::new(supabase_url, service_role_key.clone(), Some(service_role_key));
    let client = config
        .client()
        .map_err(|e| Error::Custom(format!("HTTP client: {e}")))?;

    let roles: Arc<dyn RoleStore> = match database_url {
        Some(url) => Arc::new(PgRoleStore::new(connect(&url).await?)),
        None => Arc::new(SupabaseRest::new(config.clone(), client.clone())),
    };
    let provisioner = AdminProvisioner::new(Arc::new(SupabaseAuth::new(config, client)), roles);

    let outcome = provisioner.provision(email, password).await?;
    log::info!("{}", outcome.message());
    println!("{} {}", outcome.identity.id, outcome.identity.email);
    Ok(())
}
