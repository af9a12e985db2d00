use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use sopforge_core::error::ServerError;
use sopforge_core::models::step::{
    ContextType, LogicStrategy, RoutingBranch, StepStatus, WorkflowStep,
};

use crate::state::AppState;

/// Step routes nested under `/api/workflows`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/steps", get(list_steps).post(create_step))
        .route(
            "/{id}/steps/{step_id}",
            get(get_step).put(update_step).delete(delete_step),
        )
        .route("/{id}/steps/{step_id}/branches", post(add_branch))
        .route(
            "/{id}/steps/{step_id}/branches/{branch_id}",
            axum::routing::delete(remove_branch),
        )
}

/// Flat step routes nested under `/api/steps`, used by the task-first UI.
pub fn flat_router() -> Router<AppState> {
    Router::new()
        .route(
            "/{step_id}",
            get(get_step_flat).patch(patch_step).delete(delete_step_flat),
        )
        .route("/task/{task_id}", post(create_step_for_task))
}

async fn list_steps(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<Vec<WorkflowStep>>, ServerError> {
    if !state.workflow_store.exists(&workflow_id).await? {
        return Err(ServerError::NotFound(format!(
            "Workflow {} not found",
            workflow_id
        )));
    }
    let steps = state.step_store.list_by_workflow(&workflow_id).await?;
    Ok(Json(steps))
}

#[derive(Debug, Deserialize)]
struct CreateStepRequest {
    name: String,
    /// Explicit position; omitted means append after the last step.
    step_order: Option<i64>,
    status: Option<StepStatus>,
    context_type: Option<ContextType>,
    context_image_url: Option<String>,
    context_text_content: Option<String>,
    context_voice_transcript: Option<String>,
    context_description: Option<String>,
    #[serde(default)]
    extraction_keywords: Vec<String>,
    extraction_voice_transcript: Option<String>,
    logic_strategy: Option<LogicStrategy>,
    logic_rule_expression: Option<String>,
    logic_evaluation_prompt: Option<String>,
    routing_default_next: Option<String>,
}

async fn create_step(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    Json(body): Json<CreateStepRequest>,
) -> Result<(StatusCode, Json<WorkflowStep>), ServerError> {
    if !state.workflow_store.exists(&workflow_id).await? {
        return Err(ServerError::NotFound(format!(
            "Workflow {} not found",
            workflow_id
        )));
    }

    let step_order = match body.step_order {
        Some(order) => {
            if state.step_store.order_exists(&workflow_id, order, None).await? {
                return Err(ServerError::Conflict(format!(
                    "Step order {} already exists in workflow {}",
                    order, workflow_id
                )));
            }
            order
        }
        None => state.step_store.max_order(&workflow_id).await? + 1,
    };

    let mut step = WorkflowStep::new(workflow_id, None, body.name, step_order);
    if let Some(status) = body.status {
        step.status = status;
    }
    step.context_type = body.context_type;
    step.context_image_url = body.context_image_url;
    step.context_text_content = body.context_text_content;
    step.context_voice_transcript = body.context_voice_transcript;
    step.context_description = body.context_description;
    step.extraction_keywords = body.extraction_keywords;
    step.extraction_voice_transcript = body.extraction_voice_transcript;
    step.logic_strategy = body.logic_strategy;
    step.logic_rule_expression = body.logic_rule_expression;
    step.logic_evaluation_prompt = body.logic_evaluation_prompt;
    step.routing_default_next = body.routing_default_next;

    state.step_store.save(&step).await?;
    Ok((StatusCode::CREATED, Json(step)))
}

async fn get_step(
    State(state): State<AppState>,
    Path((_workflow_id, step_id)): Path<(String, String)>,
) -> Result<Json<WorkflowStep>, ServerError> {
    state
        .step_store
        .get_with_children(&step_id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Step {} not found", step_id)))
}

#[derive(Debug, Deserialize)]
struct UpdateStepRequest {
    name: Option<String>,
    step_order: Option<i64>,
    status: Option<StepStatus>,
    task_id: Option<String>,
    context_type: Option<ContextType>,
    context_image_url: Option<String>,
    context_text_content: Option<String>,
    context_voice_transcript: Option<String>,
    context_description: Option<String>,
    extraction_keywords: Option<Vec<String>>,
    extraction_voice_transcript: Option<String>,
    logic_strategy: Option<LogicStrategy>,
    logic_rule_expression: Option<String>,
    logic_evaluation_prompt: Option<String>,
    routing_default_next: Option<String>,
    expert_notes: Option<String>,
}

async fn apply_step_update(
    state: &AppState,
    step_id: &str,
    body: UpdateStepRequest,
) -> Result<WorkflowStep, ServerError> {
    let mut step = state
        .step_store
        .get(step_id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("Step {} not found", step_id)))?;

    if let Some(new_order) = body.step_order {
        if new_order != step.step_order
            && state
                .step_store
                .order_exists(&step.workflow_id, new_order, Some(step_id))
                .await?
        {
            return Err(ServerError::Conflict(format!(
                "Step order {} already exists in workflow {}",
                new_order, step.workflow_id
            )));
        }
        step.step_order = new_order;
    }

    if let Some(name) = body.name {
        step.name = name;
    }
    if let Some(status) = body.status {
        step.status = status;
    }
    if let Some(task_id) = body.task_id {
        step.task_id = Some(task_id);
    }
    if let Some(context_type) = body.context_type {
        step.context_type = Some(context_type);
    }
    if let Some(url) = body.context_image_url {
        step.context_image_url = Some(url);
    }
    if let Some(text) = body.context_text_content {
        step.context_text_content = Some(text);
    }
    if let Some(voice) = body.context_voice_transcript {
        step.context_voice_transcript = Some(voice);
    }
    if let Some(description) = body.context_description {
        step.context_description = Some(description);
    }
    if let Some(keywords) = body.extraction_keywords {
        step.extraction_keywords = keywords;
    }
    if let Some(voice) = body.extraction_voice_transcript {
        step.extraction_voice_transcript = Some(voice);
    }
    if let Some(strategy) = body.logic_strategy {
        step.logic_strategy = Some(strategy);
    }
    if let Some(rule) = body.logic_rule_expression {
        step.logic_rule_expression = Some(rule);
    }
    if let Some(prompt) = body.logic_evaluation_prompt {
        step.logic_evaluation_prompt = Some(prompt);
    }
    if let Some(next) = body.routing_default_next {
        step.routing_default_next = Some(next);
    }
    if let Some(notes) = body.expert_notes {
        step.expert_notes = Some(notes);
    }
    step.updated_at = Utc::now();

    state.step_store.save(&step).await?;

    state
        .step_store
        .get_with_children(step_id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("Step {} not found", step_id)))
}

async fn update_step(
    State(state): State<AppState>,
    Path((_workflow_id, step_id)): Path<(String, String)>,
    Json(body): Json<UpdateStepRequest>,
) -> Result<Json<WorkflowStep>, ServerError> {
    apply_step_update(&state, &step_id, body).await.map(Json)
}

async fn delete_step(
    State(state): State<AppState>,
    Path((_workflow_id, step_id)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    let deleted = state.step_store.delete_and_renumber(&step_id).await?;
    if !deleted {
        return Err(ServerError::NotFound(format!("Step {} not found", step_id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct CreateBranchRequest {
    condition_result: String,
    action_type: String,
    next_step_id: String,
}

async fn add_branch(
    State(state): State<AppState>,
    Path((_workflow_id, step_id)): Path<(String, String)>,
    Json(body): Json<CreateBranchRequest>,
) -> Result<Json<WorkflowStep>, ServerError> {
    if !state.step_store.exists(&step_id).await? {
        return Err(ServerError::NotFound(format!("Step {} not found", step_id)));
    }

    let branch = RoutingBranch::new(
        step_id.clone(),
        body.condition_result,
        body.action_type,
        body.next_step_id,
    );
    state.step_store.add_branch(&branch).await?;

    state
        .step_store
        .get_with_children(&step_id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Step {} not found", step_id)))
}

async fn remove_branch(
    State(state): State<AppState>,
    Path((_workflow_id, step_id, branch_id)): Path<(String, String, String)>,
) -> Result<Json<WorkflowStep>, ServerError> {
    if !state.step_store.exists(&step_id).await? {
        return Err(ServerError::NotFound(format!("Step {} not found", step_id)));
    }

    state.step_store.remove_branch(&step_id, &branch_id).await?;

    state
        .step_store
        .get_with_children(&step_id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Step {} not found", step_id)))
}

// ── Flat /api/steps routes ──────────────────────────────────────────────

async fn get_step_flat(
    State(state): State<AppState>,
    Path(step_id): Path<String>,
) -> Result<Json<WorkflowStep>, ServerError> {
    state
        .step_store
        .get_with_children(&step_id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Step {} not found", step_id)))
}

async fn patch_step(
    State(state): State<AppState>,
    Path(step_id): Path<String>,
    Json(body): Json<UpdateStepRequest>,
) -> Result<Json<WorkflowStep>, ServerError> {
    apply_step_update(&state, &step_id, body).await.map(Json)
}

async fn delete_step_flat(
    State(state): State<AppState>,
    Path(step_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let deleted = state.step_store.delete_and_renumber(&step_id).await?;
    if !deleted {
        return Err(ServerError::NotFound(format!("Step {} not found", step_id)));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
struct CreateStepForTaskRequest {
    name: String,
}

/// Create a step under a task. The order is assigned per workflow (not per
/// task) because (workflow_id, step_order) is unique.
async fn create_step_for_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(body): Json<CreateStepForTaskRequest>,
) -> Result<(StatusCode, Json<WorkflowStep>), ServerError> {
    let task = state
        .task_store
        .get(&task_id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("Task {} not found", task_id)))?;

    let next_order = state.step_store.max_order(&task.workflow_id).await? + 1;
    let step = WorkflowStep::new(task.workflow_id, Some(task_id), body.name, next_order);
    state.step_store.save(&step).await?;

    Ok((StatusCode::CREATED, Json(step)))
}
