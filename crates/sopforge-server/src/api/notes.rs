use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use sopforge_core::error::ServerError;
use sopforge_core::models::note::{NoteAuthor, NoteContentType, StepNote};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/step/{step_id}", get(list_notes).post(create_note))
        .route(
            "/{note_id}",
            get(get_note).patch(update_note).delete(delete_note),
        )
}

async fn list_notes(
    State(state): State<AppState>,
    Path(step_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    if !state.step_store.exists(&step_id).await? {
        return Err(ServerError::NotFound(format!("Step {} not found", step_id)));
    }
    let notes = state.note_store.list_by_step(&step_id).await?;
    Ok(Json(serde_json::json!({ "items": notes, "total": notes.len() })))
}

#[derive(Debug, Deserialize)]
struct CreateNoteRequest {
    content_type: NoteContentType,
    content: String,
    voice_transcript: Option<String>,
    created_by: Option<NoteAuthor>,
}

async fn create_note(
    State(state): State<AppState>,
    Path(step_id): Path<String>,
    Json(body): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<StepNote>), ServerError> {
    if !state.step_store.exists(&step_id).await? {
        return Err(ServerError::NotFound(format!("Step {} not found", step_id)));
    }

    let note = StepNote::new(
        step_id,
        body.content_type,
        body.content,
        body.created_by.unwrap_or(NoteAuthor::Worker),
        body.voice_transcript,
    );
    state.note_store.save(&note).await?;

    Ok((StatusCode::CREATED, Json(note)))
}

async fn get_note(
    State(state): State<AppState>,
    Path(note_id): Path<String>,
) -> Result<Json<StepNote>, ServerError> {
    state
        .note_store
        .get(&note_id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Note {} not found", note_id)))
}

#[derive(Debug, Deserialize)]
struct UpdateNoteRequest {
    content: Option<String>,
    voice_transcript: Option<String>,
}

async fn update_note(
    State(state): State<AppState>,
    Path(note_id): Path<String>,
    Json(body): Json<UpdateNoteRequest>,
) -> Result<Json<StepNote>, ServerError> {
    let mut note = state
        .note_store
        .get(&note_id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("Note {} not found", note_id)))?;

    if let Some(content) = body.content {
        note.content = content;
    }
    if let Some(voice_transcript) = body.voice_transcript {
        note.voice_transcript = Some(voice_transcript);
    }
    note.updated_at = Utc::now();

    state.note_store.save(&note).await?;
    Ok(Json(note))
}

async fn delete_note(
    State(state): State<AppState>,
    Path(note_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let deleted = state.note_store.delete(&note_id).await?;
    if !deleted {
        return Err(ServerError::NotFound(format!("Note {} not found", note_id)));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
