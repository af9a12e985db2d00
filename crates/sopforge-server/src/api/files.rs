use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use axum_extra::extract::Multipart;
use serde::Deserialize;

use sopforge_core::error::ServerError;
use sopforge_core::upload::UploadError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_file))
        .route("/", delete(delete_file))
}

fn map_upload_error(err: UploadError) -> ServerError {
    match err {
        UploadError::InvalidFileType(_) | UploadError::FileTooLarge { .. } => {
            ServerError::BadRequest(err.to_string())
        }
        UploadError::Io(e) => ServerError::Internal(format!("Failed to store file: {}", e)),
    }
}

/// Accept a multipart upload (field name `file`) and return its public URL.
async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), ServerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ServerError::BadRequest("Missing filename".to_string()))?;
        let content_type = field.content_type().map(str::to_string);
        let content = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Failed to read upload: {}", e)))?;

        let url = state
            .files
            .save(&content, &filename, content_type.as_deref())
            .await
            .map_err(map_upload_error)?;

        return Ok((
            StatusCode::CREATED,
            Json(serde_json::json!({
                "url": url,
                "filename": filename,
                "size": content.len(),
            })),
        ));
    }

    Err(ServerError::BadRequest(
        "Missing 'file' field in multipart body".to_string(),
    ))
}

#[derive(Debug, Deserialize)]
struct DeleteFileQuery {
    url: String,
}

async fn delete_file(
    State(state): State<AppState>,
    Query(query): Query<DeleteFileQuery>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let deleted = state.files.delete(&query.url).await;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}
