//! Sopforge Server — SOP workflow authoring backend.
//!
//! A standalone Rust backend server providing:
//! - RESTful HTTP API via axum (workflows, tasks, steps, examples, notes,
//!   templates, status flow, protocol export, file upload, AI analysis)
//! - SQLite database with rusqlite
//! - static serving of uploaded media under `/uploads`
//!
//! This crate can be used standalone or embedded in other applications
//! (e.g. the CLI's `server` subcommand).

pub mod api;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use sopforge_core::db::Database;
use sopforge_core::llm::LlmClient;
use sopforge_core::upload::{FileStorage, DEFAULT_MAX_UPLOAD_SIZE};

use self::state::{AppState, AppStateInner};

/// Configuration for the sopforge backend server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    /// Directory where uploaded media is stored and served from.
    pub upload_dir: String,
    /// Maximum accepted upload size in bytes.
    pub max_upload_size: usize,
    /// Optional path to static frontend files.
    /// When set, the server serves these files for all non-API routes.
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3220,
            db_path: "sopforge.db".to_string(),
            upload_dir: "uploads".to_string(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            static_dir: None,
        }
    }
}

/// Create a shared `AppState` from a database path and upload directory.
///
/// This is useful when you need to share the state between the HTTP server
/// and other consumers (e.g. CLI commands).
pub async fn create_app_state(
    db_path: &str,
    upload_dir: &str,
    max_upload_size: usize,
) -> Result<AppState, String> {
    let db = Database::open(db_path).map_err(|e| format!("Failed to open database: {}", e))?;

    let files = FileStorage::new(upload_dir, max_upload_size)
        .map_err(|e| format!("Failed to prepare upload dir: {}", e))?;

    let llm = LlmClient::from_env();

    Ok(Arc::new(AppStateInner::new(db, files, llm)))
}

/// Start the backend server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    // Initialize tracing (no-op when the embedding binary already did)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sopforge_server=info,tower_http=info".into()),
        )
        .try_init()
        .ok();

    tracing::info!(
        "Starting sopforge backend server on {}:{}",
        config.host,
        config.port
    );

    let state = create_app_state(&config.db_path, &config.upload_dir, config.max_upload_size)
        .await?;

    start_server_with_state(config, state).await
}

/// Start the HTTP server with a pre-built `AppState`.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    // Build router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let uploads_dir = state.files.upload_dir().to_path_buf();
    let mut app = Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .nest_service(
            "/uploads",
            tower_http::services::ServeDir::new(uploads_dir),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Serve static frontend files if configured
    if let Some(ref static_dir) = config.static_dir {
        let static_path = std::path::Path::new(static_dir);
        if static_path.exists() && static_path.is_dir() {
            tracing::info!("Serving static frontend from: {}", static_dir);
            let serve_dir = tower_http::services::ServeDir::new(static_dir)
                .not_found_service(tower_http::services::ServeFile::new(
                    static_path.join("index.html"),
                ));
            app = app.fallback_service(serve_dir);
        } else {
            tracing::warn!(
                "Static directory not found: {}. Frontend won't be served.",
                static_dir
            );
        }
    }

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("Sopforge backend server listening on {}", local_addr);

    // Spawn the server in a background task
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "sopforge-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
