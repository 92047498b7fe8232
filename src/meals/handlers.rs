use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{error, instrument};
use uuid::Uuid;

use crate::meals::dto::{MealDetails, MealListItem, Pagination};
use crate::meals::repo;
use crate::state::AppState;

#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    Path(platform_user_id): Path<i64>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<MealListItem>>, (StatusCode, String)> {
    let user_id = lookup_user(&state, platform_user_id).await?;
    let meals = repo::list_by_user(&state.db, user_id, page.limit, page.offset)
        .await
        .map_err(internal)?;
    Ok(Json(meals.into_iter().map(MealListItem::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    Path((platform_user_id, meal_id)): Path<(i64, Uuid)>,
) -> Result<Json<MealDetails>, (StatusCode, String)> {
    let user_id = lookup_user(&state, platform_user_id).await?;
    match repo::get_with_items(&state.db, user_id, meal_id).await {
        Ok(Some((log, items))) => Ok(Json(MealDetails {
            id: log.id,
            logged_at: log.logged_at,
            total_calories: log.total_calories,
            total_protein_g: log.total_protein_g,
            total_fat_g: log.total_fat_g,
            total_carbs_g: log.total_carbs_g,
            items: items.into_iter().map(Into::into).collect(),
        })),
        Ok(None) => Err((StatusCode::NOT_FOUND, "Meal not found".into())),
        Err(e) => {
            error!(error = %e, %meal_id, "get_meal failed");
            Err(internal(e))
        }
    }
}

pub(crate) async fn lookup_user(
    state: &AppState,
    platform_user_id: i64,
) -> Result<Uuid, (StatusCode, String)> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE platform_user_id = $1")
        .bind(platform_user_id)
        .fetch_optional(&state.db)
        .await
        .map_err(internal)?;
    row.map(|(id,)| id)
        .ok_or((StatusCode::NOT_FOUND, "User not found".into()))
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
