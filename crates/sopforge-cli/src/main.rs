//! Sopforge CLI — command-line interface for the SOP authoring backend.
//!
//! Reuses the same core domain logic (sopforge-core) and server bootstrap
//! (sopforge-server) that power the web UI.

mod commands;

use clap::{Parser, Subcommand};

/// Sopforge CLI — SOP workflow authoring backend
#[derive(Parser)]
#[command(name = "sopforge", version, about = "Sopforge CLI — SOP workflow authoring backend")]
pub struct Cli {
    /// Path to the SQLite database file
    #[arg(long, env = "SOPFORGE_DB_PATH", default_value = "sopforge.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the sopforge HTTP backend server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3220)]
        port: u16,
        /// Directory for uploaded media
        #[arg(long, env = "SOPFORGE_UPLOAD_DIR", default_value = "uploads")]
        upload_dir: String,
        /// Path to static frontend directory
        #[arg(long)]
        static_dir: Option<String>,
    },

    /// Seed the preset workflow templates (no-op when templates exist)
    InitTemplates,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sopforge_core=warn,sopforge_server=warn,sopforge_cli=info".into()),
        )
        .init();

    let result = match cli.command {
        Commands::Server {
            host,
            port,
            upload_dir,
            static_dir,
        } => commands::server::run(host, port, cli.db, upload_dir, static_dir).await,

        Commands::InitTemplates => commands::templates::init(&cli.db).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
