pub mod analysis;
pub mod examples;
pub mod files;
pub mod notes;
pub mod protocol;
pub mod status;
pub mod steps;
pub mod tasks;
pub mod templates;
pub mod workflows;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all sub-routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/workflows", workflows::router().merge(steps::router()))
        .nest("/api/steps", steps::flat_router().merge(examples::step_router()))
        .nest("/api/examples", examples::router())
        .nest("/api/tasks", tasks::router())
        .nest("/api/notes", notes::router())
        .nest("/api/templates", templates::router())
        .nest("/api/status", status::router())
        .nest("/api/protocol", protocol::router())
        .nest("/api/analysis", analysis::router())
        .nest("/api/files", files::router())
}
