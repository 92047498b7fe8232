pub mod dto;
pub mod handlers;
pub mod repo;
pub mod service;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/:platform_user_id/meals", get(handlers::list_meals))
        .route(
            "/users/:platform_user_id/meals/:meal_id",
            get(handlers::get_meal),
        )
}
