use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use sopforge_core::error::ServerError;
use sopforge_core::models::example::{Example, ExampleContentType, ExampleLabel};

use crate::state::AppState;

/// Example routes nested under `/api/steps`.
pub fn step_router() -> Router<AppState> {
    Router::new().route("/{step_id}/examples", get(list_examples).post(create_example))
}

/// Example routes nested under `/api/examples`.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/{example_id}",
        get(get_example).put(update_example).delete(delete_example),
    )
}

#[derive(Debug, Deserialize)]
struct ListExamplesQuery {
    /// Optional PASS/FAIL filter.
    label: Option<String>,
}

async fn list_examples(
    State(state): State<AppState>,
    Path(step_id): Path<String>,
    Query(query): Query<ListExamplesQuery>,
) -> Result<Json<Vec<Example>>, ServerError> {
    if !state.step_store.exists(&step_id).await? {
        return Err(ServerError::NotFound(format!("Step {} not found", step_id)));
    }

    let label = match query.label.as_deref() {
        None => None,
        Some(raw) => Some(ExampleLabel::from_str(raw).ok_or_else(|| {
            ServerError::BadRequest(format!("Invalid label filter: {}", raw))
        })?),
    };

    let examples = state.example_store.list_by_step(&step_id, label).await?;
    Ok(Json(examples))
}

#[derive(Debug, Deserialize)]
struct CreateExampleRequest {
    content: String,
    content_type: Option<ExampleContentType>,
    label: ExampleLabel,
    description: Option<String>,
}

async fn create_example(
    State(state): State<AppState>,
    Path(step_id): Path<String>,
    Json(body): Json<CreateExampleRequest>,
) -> Result<(StatusCode, Json<Example>), ServerError> {
    if !state.step_store.exists(&step_id).await? {
        return Err(ServerError::NotFound(format!("Step {} not found", step_id)));
    }

    let example = Example::new(
        step_id,
        body.content,
        body.content_type,
        body.label,
        body.description,
    );
    state.example_store.save(&example).await?;

    Ok((StatusCode::CREATED, Json(example)))
}

async fn get_example(
    State(state): State<AppState>,
    Path(example_id): Path<String>,
) -> Result<Json<Example>, ServerError> {
    state
        .example_store
        .get(&example_id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Example {} not found", example_id)))
}

#[derive(Debug, Deserialize)]
struct UpdateExampleRequest {
    content: Option<String>,
    content_type: Option<ExampleContentType>,
    label: Option<ExampleLabel>,
    description: Option<String>,
}

async fn update_example(
    State(state): State<AppState>,
    Path(example_id): Path<String>,
    Json(body): Json<UpdateExampleRequest>,
) -> Result<Json<Example>, ServerError> {
    let mut example = state
        .example_store
        .get(&example_id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("Example {} not found", example_id)))?;

    if let Some(content) = body.content {
        example.content = content;
    }
    if let Some(content_type) = body.content_type {
        example.content_type = Some(content_type);
    }
    if let Some(label) = body.label {
        example.label = label;
    }
    if let Some(description) = body.description {
        example.description = Some(description);
    }
    example.updated_at = Utc::now();

    state.example_store.save(&example).await?;
    Ok(Json(example))
}

async fn delete_example(
    State(state): State<AppState>,
    Path(example_id): Path<String>,
) -> Result<StatusCode, ServerError> {
    let deleted = state.example_store.delete(&example_id).await?;
    if !deleted {
        return Err(ServerError::NotFound(format!(
            "Example {} not found",
            example_id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}
