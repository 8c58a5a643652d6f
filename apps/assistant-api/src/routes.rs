//! HTTP surface: a single prompt endpoint scoped by session header.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use axum_helpers::AppError;
use domain_assistant::{AssistantError, PromptRequest, PromptResponse};

use crate::state::AppState;

const SESSION_HEADER: &str = "x-session-id";
const DEFAULT_SESSION: &str = "anonymous";

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/prompt", post(handle_prompt))
        .with_state(state)
}

async fn handle_prompt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PromptRequest>,
) -> Result<Json<PromptResponse>, AppError> {
    let session = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_SESSION);

    let response = state
        .gateway
        .handle(session, request)
        .await
        .map_err(map_error)?;
    Ok(Json(response))
}

fn map_error(err: AssistantError) -> AppError {
    match err {
        AssistantError::Validation(message) | AssistantError::Resolution(message) => {
            AppError::BadRequest(message)
        }
        AssistantError::Conflict(message) => AppError::Conflict(message),
        AssistantError::PendingExpired => {
            AppError::NotFound(AssistantError::PendingExpired.to_string())
        }
        AssistantError::Upstream(message) => AppError::BadGateway(message),
        AssistantError::Internal(message) => AppError::InternalServerError(message),
    }
}
