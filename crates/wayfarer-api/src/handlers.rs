//! Route handler functions.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use wayfarer_chat::{SuggestRequest, SuggestResponse};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Chat
// =============================================================================

/// POST /chat/suggest - one conversational search turn.
pub async fn suggest(
    State(state): State<AppState>,
    body: Result<Json<SuggestRequest>, JsonRejection>,
) -> Result<Json<SuggestResponse>, ApiError> {
    let Json(request) = body?;
    let response = state.suggest.suggest(&request).await?;
    Ok(Json(response))
}

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_conversations: usize,
    pub llm_enabled: bool,
}

/// GET /health - liveness and basic service stats.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_conversations: state.suggest.conversations().len(),
        llm_enabled: state.suggest.has_extractor(),
    })
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("no such route".to_string())
}
