pub mod context;
pub mod dto;
pub mod handlers;
pub mod locks;
pub mod machine;
pub mod repo;
pub mod service;

use axum::routing::post;
use axum::Router;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::sessions::context::{SessionContext, SessionStatus};
use crate::state::AppState;

/// One photo-to-meal workflow as persisted by the store adapter.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub photo_id: Option<Uuid>,
    pub status: SessionStatus,
    pub context: SessionContext,
    pub expires_at: OffsetDateTime,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/actions", post(handlers::handle_action))
}
