pub mod handlers;
pub mod repo;
pub mod resolver;
pub mod service;

use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::state::AppState;

/// A user-scoped reusable food definition. Nutrition values are stored at the
/// declared basis; `use_count`/`last_used_at` feed resolver affinity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LibraryFood {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub brand: Option<String>,
    pub store: Option<String>,
    pub source_type: String,
    pub source_ref: Option<String>,
    pub basis: String,
    pub serving_size_g: Option<f64>,
    pub calories: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
    pub use_count: i32,
    pub last_used_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl LibraryFood {
    /// Display label: name plus brand/store qualifiers when present.
    pub fn display_label(&self) -> String {
        let mut parts = vec![self.name.clone()];
        if let Some(brand) = &self.brand {
            parts.push(brand.clone());
        }
        if let Some(store) = &self.store {
            parts.push(store.clone());
        }
        parts.join(" - ")
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/users/:platform_user_id/library",
        get(handlers::list_library),
    )
}
