use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "studyhub", version, about = "StudyHub operator tools")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the version.
    Version,

    /// Ensure an identity exists and holds the admin role. Safe to repeat.
    CreateAdmin {
        #[arg(long)]
        email: String,

        #[arg(long, env = "STUDYHUB_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,

        /// Supabase project URL.
        #[arg(long, env = "SUPABASE_URL")]
        supabase_url: String,

        /// Supabase service role key.
        #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
        service_role_key: String,

        /// Write the role to this Postgres database instead of through the REST API.
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },

    /// Run the embedded schema migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
}
