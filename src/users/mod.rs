pub mod repo;
pub mod service;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A tracked user, keyed by the messaging platform's numeric id. Created on
/// first contact; the engine never deletes users.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub platform_user_id: i64,
    pub created_at: OffsetDateTime,
    pub last_active_at: OffsetDateTime,
}
