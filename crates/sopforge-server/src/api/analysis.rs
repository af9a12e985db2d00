use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use sopforge_core::analysis::{analyze_step, AnalysisResponse, PreviousOutput};
use sopforge_core::error::ServerError;
use sopforge_core::llm::LlmError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/steps/{step_id}/analyze", post(analyze_step_handler))
        .route("/status", get(llm_status))
}

#[derive(Debug, Default, Deserialize)]
struct AnalyzeStepRequest {
    /// Output variables of earlier steps, so the drafted contract reuses
    /// their names.
    #[serde(default)]
    previous_outputs: Vec<PreviousOutput>,
}

/// Draft a data contract for a step from its description and materials.
/// The body is optional; a bare POST analyzes without upstream context.
async fn analyze_step_handler(
    State(state): State<AppState>,
    Path(step_id): Path<String>,
    body: Result<Json<AnalyzeStepRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<Json<AnalysisResponse>, ServerError> {
    if !state.llm.is_enabled() {
        return Err(ServerError::Unavailable(
            "LLM service is disabled. Please enable it in configuration.".to_string(),
        ));
    }

    let step = state
        .step_store
        .get_with_children(&step_id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("Step {} not found", step_id)))?;

    let request = body.map(|Json(r)| r).unwrap_or_default();

    match analyze_step(&step, &request.previous_outputs, &state.llm).await {
        Ok(response) => Ok(Json(response)),
        Err(LlmError::Disabled) => Err(ServerError::Unavailable(
            "LLM service is disabled".to_string(),
        )),
        Err(err) => {
            tracing::error!("LLM analysis failed: {}", err);
            Err(ServerError::Internal(format!("Analysis failed: {}", err)))
        }
    }
}

async fn llm_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "enabled": state.llm.is_enabled(),
        "model": state.llm.model(),
        "api_base": state.llm.base_url(),
    }))
}
