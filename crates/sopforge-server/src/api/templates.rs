use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use sopforge_core::error::ServerError;
use sopforge_core::models::workflow::Workflow;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_templates))
        .route("/init", post(init_templates))
        .route("/{template_id}", get(get_template))
        .route("/{template_id}/create", post(create_from_template))
}

async fn list_templates(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let templates = state.template_store.list().await?;
    Ok(Json(
        serde_json::json!({ "items": templates, "total": templates.len() }),
    ))
}

async fn get_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
) -> Result<Json<Workflow>, ServerError> {
    state
        .template_store
        .get(&template_id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Template {} not found", template_id)))
}

#[derive(Debug, Deserialize)]
struct CreateFromTemplateRequest {
    name: String,
    description: Option<String>,
}

async fn create_from_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    Json(body): Json<CreateFromTemplateRequest>,
) -> Result<(StatusCode, Json<Workflow>), ServerError> {
    let workflow_id = state
        .template_store
        .create_workflow_from(&template_id, &body.name, body.description)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("Template {} not found", template_id)))?;

    let workflow = state
        .workflow_store
        .get_aggregate(&workflow_id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("Workflow {} not found", workflow_id)))?;

    Ok((StatusCode::CREATED, Json(workflow)))
}

async fn init_templates(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let created = state.template_store.init_presets().await?;
    Ok(Json(serde_json::json!({ "created": created })))
}
