use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use sopforge_core::error::ServerError;
use sopforge_core::models::task::{Task, TaskStatus};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/workflow/{workflow_id}", get(list_tasks).post(create_task))
        .route("/workflow/{workflow_id}/reorder", post(reorder_tasks))
        .route(
            "/{task_id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
}

async fn list_tasks(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    if !state.workflow_store.exists(&workflow_id).await? {
        return Err(ServerError::NotFound(format!(
            "Workflow {} not found",
            workflow_id
        )));
    }
    let tasks = state.task_store.list_by_workflow(&workflow_id).await?;
    Ok(Json(serde_json::json!({ "items": tasks, "total": tasks.len() })))
}

#[derive(Debug, Deserialize)]
struct CreateTaskRequest {
    name: String,
    description: Option<String>,
}

async fn create_task(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ServerError> {
    if !state.workflow_store.exists(&workflow_id).await? {
        return Err(ServerError::NotFound(format!(
            "Workflow {} not found",
            workflow_id
        )));
    }

    let task_order = state.task_store.next_order(&workflow_id).await?;
    let task = Task::new(workflow_id, body.name, task_order, body.description);
    state.task_store.save(&task).await?;

    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, ServerError> {
    state
        .task_store
        .get(&task_id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Task {} not found", task_id)))
}

#[derive(Debug, Deserialize)]
struct UpdateTaskRequest {
    name: Option<String>,
    description: Option<String>,
    status: Option<TaskStatus>,
}

async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(body): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, ServerError> {
    let mut task = state
        .task_store
        .get(&task_id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("Task {} not found", task_id)))?;

    if let Some(name) = body.name {
        task.name = name;
    }
    if let Some(description) = body.description {
        task.description = Some(description);
    }
    if let Some(status) = body.status {
        task.status = status;
    }
    task.updated_at = Utc::now();

    state.task_store.save(&task).await?;

    state
        .task_store
        .get(&task_id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Task {} not found", task_id)))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let deleted = state.task_store.delete(&task_id).await?;
    if !deleted {
        return Err(ServerError::NotFound(format!("Task {} not found", task_id)));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
struct ReorderTasksRequest {
    task_ids: Vec<String>,
}

async fn reorder_tasks(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    Json(body): Json<ReorderTasksRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    if !state.workflow_store.exists(&workflow_id).await? {
        return Err(ServerError::NotFound(format!(
            "Workflow {} not found",
            workflow_id
        )));
    }

    state
        .task_store
        .reorder(&workflow_id, body.task_ids)
        .await?;

    let tasks = state.task_store.list_by_workflow(&workflow_id).await?;
    Ok(Json(serde_json::json!({ "items": tasks, "total": tasks.len() })))
}
