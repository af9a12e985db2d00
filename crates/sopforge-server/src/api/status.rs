//! Status flow endpoints.
//!
//! An illegal transition is an expected business outcome: it comes back as
//! HTTP 200 with `success: false` and the legal alternatives, never as an
//! HTTP error. Only a missing workflow is a 404.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use sopforge_core::error::ServerError;
use sopforge_core::models::workflow::WorkflowStatus;
use sopforge_core::status;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/workflow/{id}", get(get_workflow_status))
        .route("/workflow/{id}/transition", post(transition_workflow_status))
        .route("/workflow/{id}/advance", post(advance_workflow_status))
        .route("/workflow/{id}/rollback", post(rollback_workflow_status))
}

async fn load_status(state: &AppState, id: &str) -> Result<WorkflowStatus, ServerError> {
    state
        .workflow_store
        .get(id)
        .await?
        .map(|workflow| workflow.status)
        .ok_or_else(|| ServerError::NotFound(format!("Workflow {} not found", id)))
}

async fn get_workflow_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let current = load_status(&state, &id).await?;
    let info = status::status_info(current);

    Ok(Json(serde_json::json!({
        "id": id,
        "status": info.status,
        "label": info.label,
        "color": info.color,
        "allowed_transitions": info.allowed_transitions,
    })))
}

#[derive(Debug, Deserialize)]
struct TransitionRequest {
    new_status: WorkflowStatus,
}

async fn transition_workflow_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TransitionRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let current = load_status(&state, &id).await?;

    match status::transition(current, body.new_status) {
        Ok(new_status) => {
            state.workflow_store.update_status(&id, new_status).await?;
            let info = status::status_info(new_status);
            Ok(Json(serde_json::json!({
                "success": true,
                "id": id,
                "status": info.status,
                "label": info.label,
                "color": info.color,
                "allowed_transitions": info.allowed_transitions,
            })))
        }
        Err(rejection) => Ok(Json(serde_json::json!({
            "success": false,
            "error": rejection.error,
            "allowed_transitions": rejection.allowed_transitions,
        }))),
    }
}

async fn advance_workflow_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let current = load_status(&state, &id).await?;

    match status::advance(current) {
        Ok(new_status) => {
            state.workflow_store.update_status(&id, new_status).await?;
            Ok(Json(serde_json::json!({
                "success": true,
                "id": id,
                "previous_status": current,
                "status": new_status,
                "label": new_status.label(),
                "color": new_status.color(),
            })))
        }
        Err(err) => Ok(Json(serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "status": current,
        }))),
    }
}

async fn rollback_workflow_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let current = load_status(&state, &id).await?;

    match status::rollback(current) {
        Ok(new_status) => {
            state.workflow_store.update_status(&id, new_status).await?;
            Ok(Json(serde_json::json!({
                "success": true,
                "id": id,
                "previous_status": current,
                "status": new_status,
                "label": new_status.label(),
                "color": new_status.color(),
            })))
        }
        Err(err) => Ok(Json(serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "status": current,
        }))),
    }
}
