use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use sopforge_core::error::ServerError;
use sopforge_core::models::workflow::{Workflow, WorkflowStatus};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_workflows).post(create_workflow))
        .route(
            "/{id}",
            get(get_workflow).put(update_workflow).delete(delete_workflow),
        )
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<u32>,
    page_size: Option<u32>,
}

async fn list_workflows(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(20).clamp(1, 100);

    let items = state.workflow_store.list(page, page_size).await?;
    let total = state.workflow_store.count().await?;

    Ok(Json(serde_json::json!({
        "items": items,
        "total": total,
        "page": page,
        "page_size": page_size,
    })))
}

#[derive(Debug, Deserialize)]
struct CreateWorkflowRequest {
    name: String,
    description: Option<String>,
    cover_image_url: Option<String>,
    status: Option<WorkflowStatus>,
}

async fn create_workflow(
    State(state): State<AppState>,
    Json(body): Json<CreateWorkflowRequest>,
) -> Result<(StatusCode, Json<Workflow>), ServerError> {
    let mut workflow = Workflow::new(body.name, body.description, body.cover_image_url);
    if let Some(status) = body.status {
        workflow.status = status;
    }

    state.workflow_store.save(&workflow).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Workflow>, ServerError> {
    state
        .workflow_store
        .get_aggregate(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Workflow {} not found", id)))
}

#[derive(Debug, Deserialize)]
struct UpdateWorkflowRequest {
    name: Option<String>,
    description: Option<String>,
    cover_image_url: Option<String>,
    status: Option<WorkflowStatus>,
}

async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateWorkflowRequest>,
) -> Result<Json<Workflow>, ServerError> {
    let mut workflow = state
        .workflow_store
        .get(&id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("Workflow {} not found", id)))?;

    if let Some(name) = body.name {
        workflow.name = name;
    }
    if let Some(description) = body.description {
        workflow.description = Some(description);
    }
    if let Some(cover_image_url) = body.cover_image_url {
        workflow.cover_image_url = Some(cover_image_url);
    }
    if let Some(status) = body.status {
        workflow.status = status;
    }
    workflow.updated_at = Utc::now();

    state.workflow_store.save(&workflow).await?;

    state
        .workflow_store
        .get_aggregate(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Workflow {} not found", id)))
}

async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    let deleted = state.workflow_store.delete(&id).await?;
    if !deleted {
        return Err(ServerError::NotFound(format!("Workflow {} not found", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}
