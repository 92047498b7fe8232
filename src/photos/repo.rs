//! Transient photo references. Only the platform's opaque file id is stored,
//! never image bytes, and the row is removed when its session ends.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::EngineError;

#[async_trait]
pub trait PhotoRepository: Send + Sync {
    async fn create(&self, user_id: Uuid, platform_file_id: &str) -> Result<Uuid, EngineError>;
    async fn delete(&self, photo_id: Uuid) -> Result<(), EngineError>;
}

pub struct PgPhotoRepository {
    db: PgPool,
}

impl PgPhotoRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PhotoRepository for PgPhotoRepository {
    async fn create(&self, user_id: Uuid, platform_file_id: &str) -> Result<Uuid, EngineError> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO photos (user_id, platform_file_id)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(platform_file_id)
        .fetch_one(&self.db)
        .await?;
        Ok(id)
    }

    async fn delete(&self, photo_id: Uuid) -> Result<(), EngineError> {
        sqlx::query("DELETE FROM photos WHERE id = $1")
            .bind(photo_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
