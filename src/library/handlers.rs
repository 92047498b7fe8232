use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::instrument;

use crate::library::repo::{LibraryRepository, PgLibraryRepository};
use crate::library::LibraryFood;
use crate::meals::handlers::lookup_user;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LibraryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

/// Top library foods by usage, most recently used first.
#[instrument(skip(state))]
pub async fn list_library(
    State(state): State<AppState>,
    Path(platform_user_id): Path<i64>,
    Query(query): Query<LibraryQuery>,
) -> Result<Json<Vec<LibraryFood>>, (StatusCode, String)> {
    let user_id = lookup_user(&state, platform_user_id).await?;
    let repo = PgLibraryRepository::new(state.db.clone());
    let foods = repo
        .top_foods(user_id, query.limit)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(foods))
}
