use axum::extract::State;
use axum::Json;
use tracing::instrument;

use crate::error::EngineError;
use crate::sessions::dto::{ActionRequest, ActionResponse};
use crate::state::AppState;

/// The single logical operation exposed to the messaging front-end: apply one
/// user action to that user's session and return the next prompt.
#[instrument(skip(state, request), fields(platform_user_id = request.platform_user_id))]
pub async fn handle_action(
    State(state): State<AppState>,
    Json(request): Json<ActionRequest>,
) -> Result<Json<ActionResponse>, EngineError> {
    let response = state
        .sessions
        .handle_action(
            request.platform_user_id,
            request.session_id,
            request.action,
        )
        .await?;
    Ok(Json(response))
}
