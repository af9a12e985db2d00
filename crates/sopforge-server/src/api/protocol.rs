use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use sopforge_core::error::ServerError;
use sopforge_core::protocol::{project_workflow, ProtocolWorkflow};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/{workflow_id}", get(get_protocol))
}

/// Generate Protocol JSON for a workflow, for consumption by the
/// downstream automation engine.
async fn get_protocol(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<ProtocolWorkflow>, ServerError> {
    let workflow = state
        .workflow_store
        .get_aggregate(&workflow_id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("Workflow {} not found", workflow_id)))?;

    Ok(Json(project_workflow(&workflow)))
}
